pub use super::issued_tokens::Entity as IssuedTokens;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
