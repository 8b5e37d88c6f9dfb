pub mod alarm;
pub mod app;
pub mod command;
pub mod fetcher;
pub mod renderer;
