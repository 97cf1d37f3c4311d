pub mod health_policy;
mod load_balancer;

pub use load_balancer::LoadBalancer;
