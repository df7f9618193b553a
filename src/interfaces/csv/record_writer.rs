use crate::domain::entitlement::UserRecord;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

const HEADER: [&str; 7] = [
    "user",
    "trials_used",
    "trials_left",
    "package",
    "quota",
    "package_expiry",
    "pending_order",
];

#[derive(Serialize)]
struct SnapshotRow<'a> {
    user: &'a str,
    trials_used: u32,
    trials_left: u32,
    package: Option<&'static str>,
    quota: u32,
    package_expiry: Option<String>,
    pending_order: Option<&'a str>,
}

/// Writes the entitlement snapshot as CSV:
/// `user,trials_used,trials_left,package,quota,package_expiry,pending_order`.
///
/// `quota` is the usable quota at `now`, so an expired package shows zero.
pub struct EntitlementWriter<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl<W: Write> EntitlementWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
            header_written: false,
        }
    }

    /// The header is written once, even for an empty snapshot.
    pub fn write_records(&mut self, records: &[UserRecord], now: DateTime<Utc>) -> Result<()> {
        if !self.header_written {
            self.writer.write_record(HEADER)?;
            self.header_written = true;
        }
        for record in records {
            self.writer.serialize(SnapshotRow {
                user: record.user.as_str(),
                trials_used: record.trial_count,
                trials_left: record.remaining_trials(),
                package: record.package.map(|package| package.name()),
                quota: record.effective_quota(now),
                package_expiry: record
                    .package_expiry
                    .map(|expiry| expiry.to_rfc3339_opts(SecondsFormat::Secs, true)),
                pending_order: record
                    .pending_payment
                    .as_ref()
                    .map(|pending| pending.order_id.as_str()),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
