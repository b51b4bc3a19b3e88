pub mod checkpoints;
pub mod conversations;
pub mod health;
pub mod messages;
