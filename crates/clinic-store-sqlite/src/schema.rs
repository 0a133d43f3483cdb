//! SQL schema for the clinic SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Named counters for numbers that must never be reused.
CREATE TABLE IF NOT EXISTS sequences (
    name        TEXT PRIMARY KEY,
    next_value  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS terms (
    code        TEXT PRIMARY KEY,
    starts_on   TEXT NOT NULL,   -- ISO 8601 date
    ends_on     TEXT NOT NULL,
    CHECK (starts_on <= ends_on)
);

-- ── Taxonomy ────────────────────────────────────────────────────────────────
-- Below the subject level every key is scoped to its parent. Each parent row
-- holds the next number to hand out to a child; it only ever increases.

CREATE TABLE IF NOT EXISTS subjects (
    subject_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    name           TEXT NOT NULL,
    next_category  INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS categories (
    subject_id        INTEGER NOT NULL
                      REFERENCES subjects(subject_id) ON DELETE CASCADE,
    category_number   INTEGER NOT NULL,
    name              TEXT NOT NULL,
    next_subcategory  INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (subject_id, category_number)
);

CREATE TABLE IF NOT EXISTS subcategories (
    subject_id          INTEGER NOT NULL,
    category_number     INTEGER NOT NULL,
    subcategory_number  INTEGER NOT NULL,
    name                TEXT NOT NULL,
    next_scope          INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (subject_id, category_number, subcategory_number),
    FOREIGN KEY (subject_id, category_number)
        REFERENCES categories(subject_id, category_number) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS legal_scopes (
    subject_id          INTEGER NOT NULL,
    category_number     INTEGER NOT NULL,
    subcategory_number  INTEGER NOT NULL,
    scope_number        INTEGER NOT NULL,
    name                TEXT NOT NULL,
    PRIMARY KEY (subject_id, category_number, subcategory_number, scope_number),
    FOREIGN KEY (subject_id, category_number, subcategory_number)
        REFERENCES subcategories(subject_id, category_number, subcategory_number)
        ON DELETE CASCADE
);

-- ── Cases ───────────────────────────────────────────────────────────────────

-- RESTRICT stops any taxonomy delete (direct or cascaded) that would orphan
-- a case.
CREATE TABLE IF NOT EXISTS cases (
    case_number         INTEGER PRIMARY KEY,
    applicant_id        TEXT NOT NULL,
    facility_id         INTEGER NOT NULL,
    procedure_type_id   INTEGER NOT NULL,
    subject_id          INTEGER NOT NULL,
    category_number     INTEGER NOT NULL,
    subcategory_number  INTEGER NOT NULL,
    scope_number        INTEGER NOT NULL,
    synopsis            TEXT NOT NULL,
    start_date          TEXT NOT NULL,
    end_date            TEXT,
    term                TEXT NOT NULL REFERENCES terms(code),
    created_at          TEXT NOT NULL,
    FOREIGN KEY (subject_id, category_number, subcategory_number, scope_number)
        REFERENCES legal_scopes(subject_id, category_number, subcategory_number, scope_number)
        ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS beneficiaries (
    case_number      INTEGER NOT NULL REFERENCES cases(case_number) ON DELETE CASCADE,
    position         INTEGER NOT NULL,
    identity_number  TEXT NOT NULL,
    owns_identity    INTEGER NOT NULL CHECK (owns_identity IN (0, 1)),
    first_names      TEXT NOT NULL,
    last_names       TEXT NOT NULL,
    sex              TEXT,            -- 'female' | 'male'
    birth_date       TEXT,
    kind             TEXT NOT NULL CHECK (kind IN ('direct', 'indirect')),
    has_kinship      INTEGER NOT NULL CHECK (has_kinship IN (0, 1)),
    PRIMARY KEY (case_number, position)
);

CREATE TABLE IF NOT EXISTS legal_supports (
    support_id    TEXT PRIMARY KEY,
    case_number   INTEGER NOT NULL REFERENCES cases(case_number) ON DELETE CASCADE,
    description   TEXT NOT NULL,
    document_url  TEXT NOT NULL,
    observation   TEXT,
    created_at    TEXT NOT NULL
);

-- ── Status ledger ───────────────────────────────────────────────────────────
-- Append-only. Rows disappear only with their case.
CREATE TABLE IF NOT EXISTS status_entries (
    case_number    INTEGER NOT NULL REFERENCES cases(case_number) ON DELETE CASCADE,
    sequence       INTEGER NOT NULL CHECK (sequence >= 1),
    status         TEXT NOT NULL CHECK (status IN
                     ('in_progress', 'under_advisory', 'delivered', 'archived', 'paused')),
    recorded_at    TEXT NOT NULL,
    reason         TEXT NOT NULL,
    acting_person  TEXT NOT NULL,
    PRIMARY KEY (case_number, sequence)
);

CREATE TRIGGER IF NOT EXISTS status_entries_append_only
BEFORE UPDATE ON status_entries
BEGIN
    SELECT RAISE(ABORT, 'status entries are append-only');
END;

-- Cascading deletes run after the case row is gone, so they pass.
CREATE TRIGGER IF NOT EXISTS status_entries_keep_while_case_exists
BEFORE DELETE ON status_entries
WHEN EXISTS (SELECT 1 FROM cases WHERE case_number = OLD.case_number)
BEGIN
    SELECT RAISE(ABORT, 'status entries are append-only');
END;

-- ── People ──────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS identities (
    identity_id  TEXT PRIMARY KEY,   -- normalised national id
    first_names  TEXT NOT NULL,
    last_names   TEXT NOT NULL,
    email        TEXT NOT NULL,
    phone        TEXT,
    sex          TEXT,
    role         TEXT NOT NULL CHECK (role IN ('student', 'supervisor')),
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participations (
    identity_id  TEXT NOT NULL REFERENCES identities(identity_id) ON DELETE CASCADE,
    term         TEXT NOT NULL REFERENCES terms(code),
    kind         TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (identity_id, term)
);

-- ── Assignments ─────────────────────────────────────────────────────────────
-- Rows are superseded (active = 0), never deleted. The partial indexes allow
-- any number of inactive rows but only one active row per person and at most
-- one active supervisor per case and term.
CREATE TABLE IF NOT EXISTS assignments (
    assignment_id  INTEGER PRIMARY KEY,
    case_number    INTEGER NOT NULL REFERENCES cases(case_number) ON DELETE CASCADE,
    person_id      TEXT NOT NULL REFERENCES identities(identity_id),
    term           TEXT NOT NULL REFERENCES terms(code),
    role           TEXT NOT NULL CHECK (role IN ('student', 'supervisor')),
    active         INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
    assigned_at    TEXT NOT NULL,
    released_at    TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS assignments_active_person_idx
    ON assignments(case_number, person_id, term) WHERE active = 1;
CREATE UNIQUE INDEX IF NOT EXISTS assignments_active_supervisor_idx
    ON assignments(case_number, term) WHERE active = 1 AND role = 'supervisor';

CREATE INDEX IF NOT EXISTS cases_term_idx           ON cases(term);
CREATE INDEX IF NOT EXISTS assignments_case_idx     ON assignments(case_number);
CREATE INDEX IF NOT EXISTS participations_term_idx  ON participations(term);

PRAGMA user_version = 1;
";
