pub mod cart_resolver;
pub mod order_builder;
pub mod order_view;
pub mod order_workflow;
pub mod scheduler;
