pub mod middleware;
pub mod password;
pub mod token;

/// The one account allowed to see and edit financial fields.
pub const SUPER_USER_ID: i64 = 1;

pub fn is_super_user(user_id: i64) -> bool {
    user_id == SUPER_USER_ID
}
