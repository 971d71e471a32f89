mod bootstrap;
mod relay_config;
