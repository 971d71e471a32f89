mod config;
mod ingest;
