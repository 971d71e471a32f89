mod config_sync;
mod helpers;
mod ingest;
mod outbound;
