// Domain layer - Core build model and rules

pub mod model;
pub mod rules;
pub mod settings;
