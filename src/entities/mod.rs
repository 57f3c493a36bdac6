pub mod prelude;

pub mod issued_tokens;
pub mod sessions;
pub mod users;
