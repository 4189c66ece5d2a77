pub mod cookie;
pub mod password;
pub mod token;
