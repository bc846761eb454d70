// Database schema definitions and migrations
// Applied in order by Database::run_migrations; every statement is idempotent.

pub const INITIAL_SCHEMA: &str = include_str!("../../migrations/001_initial_schema.sql");
pub const AUDIT_LOG_SCHEMA: &str = include_str!("../../migrations/002_audit_log.sql");
pub const ANCHOR_RECORDS_SCHEMA: &str = include_str!("../../migrations/003_anchor_records.sql");

pub const MIGRATIONS: [(&str, &str); 3] = [
    ("001_initial_schema", INITIAL_SCHEMA),
    ("002_audit_log", AUDIT_LOG_SCHEMA),
    ("003_anchor_records", ANCHOR_RECORDS_SCHEMA),
];
