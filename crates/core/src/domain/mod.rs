pub mod conversation;
pub mod delegation;
pub mod outcome;
pub mod pending;
