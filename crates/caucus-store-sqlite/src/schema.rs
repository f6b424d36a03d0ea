//! SQL schema for the Caucus SQLite store.
//!
//! Production databases already carry the three directory views, which are
//! populated by the ingestion job; only the `orders` table is owned here.

/// Order book DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const ORDERS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS orders (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    buyer_id          TEXT NOT NULL,
    contact_ids       TEXT NOT NULL,        -- JSON array of contact refs
    amount            INTEGER NOT NULL CHECK (amount >= 0),  -- minor units
    currency          TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending'
                      CHECK (status IN ('pending', 'completed', 'failed')),
    payment_reference TEXT,
    notify_email      TEXT,
    created_at        TEXT NOT NULL,        -- RFC 3339 UTC
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS orders_buyer_idx     ON orders(buyer_id, created_at);
CREATE INDEX IF NOT EXISTS orders_reference_idx ON orders(payment_reference);
";

/// Stand-in tables with the same names and columns as the directory views.
///
/// Only installed into in-memory stores, for development and tests.
/// `senator_linkedin_found` has no declared type so legacy boolean values
/// keep whatever storage class they were written with.
pub const DIRECTORY_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mv_contacts_mp_and_constituency_assistants (
    id                              INTEGER PRIMARY KEY,
    person_type                     TEXT,
    full_name                       TEXT,
    title                           TEXT,
    mp_name                         TEXT,
    political_party                 TEXT,
    riding                          TEXT,
    province                        TEXT,
    email                           TEXT,
    telephone                       TEXT,
    fax                             TEXT,
    committees                      TEXT,   -- comma-separated
    parliamentary_offices           TEXT,   -- comma-separated
    primary_role                    TEXT,
    profile_url                     TEXT,
    hill_office_street              TEXT,
    hill_office_city                TEXT,
    hill_office_province            TEXT,
    hill_office_postal_code         TEXT,
    hill_office_phone               TEXT,
    constituency_office_name        TEXT,
    constituency_office_street      TEXT,
    constituency_office_city        TEXT,
    constituency_office_province    TEXT,
    constituency_office_postal_code TEXT,
    constituency_office_phone       TEXT
);

CREATE TABLE IF NOT EXISTS mv_contacts_senators_and_staffers (
    id                     INTEGER PRIMARY KEY,
    person_type            TEXT,
    full_name              TEXT,
    title                  TEXT,
    senator_name           TEXT,
    senator_province       TEXT,
    senator_affiliation    TEXT,
    email                  TEXT,
    telephone              TEXT,
    committees             TEXT,
    parliamentary_offices  TEXT,
    linkedin_url           TEXT,
    senator_linkedin_url   TEXT,
    senator_linkedin_found,
    senator_url            TEXT,
    nomination_date        TEXT,
    retirement_date        TEXT
);

CREATE TABLE IF NOT EXISTS mv_provincial_legislator_contacts (
    id                   INTEGER PRIMARY KEY,
    person_type          TEXT,
    full_name            TEXT,
    title                TEXT,
    province             TEXT,
    party                TEXT,
    constituency         TEXT,
    email                TEXT,
    telephone            TEXT,
    committees           TEXT,
    constituency_address TEXT,
    legislative_address  TEXT,
    profile_summary      TEXT,
    education            TEXT,
    work_experience      TEXT,
    website_url          TEXT
);
";
