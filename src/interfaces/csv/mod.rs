pub mod event_reader;
pub mod record_writer;
