use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Idempotent schema bootstrap, run once at startup. Statements are executed
/// one at a time because sqlx prepares each query individually.
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        url TEXT UNIQUE NOT NULL,
        source TEXT NOT NULL,
        title TEXT NOT NULL,
        company TEXT NOT NULL,
        location TEXT,
        work_type TEXT NOT NULL DEFAULT 'unspecified',
        salary_min BIGINT,
        salary_max BIGINT,
        description TEXT,
        requirements TEXT,
        posted_date DATE,
        scraped_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        fit_score DOUBLE PRECISION,
        fit_rationale TEXT,
        score_failed BOOLEAN NOT NULL DEFAULT FALSE,
        status TEXT NOT NULL DEFAULT 'new',
        notes TEXT,
        dedup_key TEXT NOT NULL,
        duplicate_of TEXT REFERENCES jobs(id),
        embedding REAL[]
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs(source)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_scraped_at ON jobs(scraped_at)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_dedup_key ON jobs(dedup_key)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_duplicate_of ON jobs(duplicate_of)",
    r#"
    CREATE TABLE IF NOT EXISTS search_runs (
        id BIGSERIAL PRIMARY KEY,
        run_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        sources TEXT[] NOT NULL,
        jobs_found BIGINT NOT NULL,
        new_jobs BIGINT NOT NULL,
        duration_seconds DOUBLE PRECISION NOT NULL,
        errors TEXT[] NOT NULL DEFAULT '{}'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS applications (
        id BIGSERIAL PRIMARY KEY,
        job_id TEXT NOT NULL REFERENCES jobs(id),
        resume_version TEXT,
        tailored_resume TEXT,
        resume_highlights TEXT,
        cover_letter TEXT,
        cover_tone TEXT,
        tailored_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        applied_at TIMESTAMPTZ,
        response TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_applications_job_id ON applications(job_id)",
    r#"
    CREATE TABLE IF NOT EXISTS profile (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        data JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub async fn init_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema initialized");
    Ok(())
}
