pub mod operators;
pub mod subscriptions;
pub mod webhooks;
