//! services/coach/src/bin/coach.rs

use coach_lib::{
    adapters::{
        responses::DEFAULT_INSTRUCTIONS, FileSecretStore, FsMediaStore, OpenAiResponsesAdapter,
        ResponsesSettings, SqliteRecordStore,
    },
    config::Config,
    error::CoachError,
    progress::print_progress,
};
use photo_coach_core::{
    FeedbackSession, FeedbackState, Photo, PhotoLibrary, RecordStore, SecretStore, SessionConfig,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const USAGE: &str = "usage: coach analyze <image-file> | ask <photo-id> <question...> | list | delete <photo-id>";

struct App {
    records: Arc<SqliteRecordStore>,
    library: PhotoLibrary,
    session: FeedbackSession,
}

#[tokio::main]
async fn main() -> Result<(), CoachError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded.");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        return Err(CoachError::Usage(USAGE.to_string()));
    };

    let app = build(&config).await?;

    match (command.as_str(), rest) {
        ("analyze", [path]) => analyze(app, path).await,
        ("ask", [photo_id, question @ ..]) if !question.is_empty() => {
            ask(app, photo_id, &question.join(" ")).await
        }
        ("list", []) => list(&app).await,
        ("delete", [photo_id]) => {
            let photo = app.library.get(parse_photo_id(photo_id)?).await?;
            app.library.delete(&photo).await?;
            println!("Deleted {}", photo.id);
            Ok(())
        }
        _ => Err(CoachError::Usage(USAGE.to_string())),
    }
}

async fn build(config: &Config) -> Result<App, CoachError> {
    // --- 2. Open Local Storage & Run Migrations ---
    let media = Arc::new(FsMediaStore::open(&config.data_dir).await?);

    info!("Connecting to database...");
    let pool = SqliteRecordStore::connect(&config.database_url).await?;
    let records = Arc::new(SqliteRecordStore::new(pool));
    info!("Running database migrations...");
    records.run_migrations().await?;

    let secrets = Arc::new(FileSecretStore::new(config.data_dir.join("api_key")));
    if let Some(key) = &config.openai_api_key {
        secrets.set_api_key(key).await?;
    }

    // --- 3. Initialize the Transport & Session ---
    let transport = Arc::new(OpenAiResponsesAdapter::new(
        reqwest::Client::new(),
        secrets,
        ResponsesSettings {
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            instructions: config
                .instructions
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            max_output_tokens: config.max_output_tokens,
        },
    ));

    let library = PhotoLibrary::new(records.clone(), media.clone());
    let session = FeedbackSession::new(
        records.clone(),
        media,
        transport,
        SessionConfig {
            max_dimension: config.max_dimension,
            update_interval: config.update_interval,
        },
    );

    Ok(App {
        records,
        library,
        session,
    })
}

fn parse_photo_id(raw: &str) -> Result<Uuid, CoachError> {
    Uuid::parse_str(raw).map_err(|_| CoachError::Usage(format!("'{}' is not a photo id", raw)))
}

//=========================================================================================
// Commands
//=========================================================================================

async fn analyze(app: App, path: &str) -> Result<(), CoachError> {
    let image_data = tokio::fs::read(path).await?;
    let photo = app.library.capture(&image_data).await?;
    println!("Photo {}\n", photo.id);

    let mut session = app.session;
    let printer = spawn_printer(&session);
    session.fetch_feedback(&photo).await;
    finish(session, printer).await
}

async fn ask(app: App, photo_id: &str, question: &str) -> Result<(), CoachError> {
    let photo = app.library.get(parse_photo_id(photo_id)?).await?;
    let mut session = app.session;
    session.load_existing(&photo).await;

    let printer = spawn_printer(&session);
    session.send_followup(question, &photo).await;
    finish(session, printer).await
}

async fn list(app: &App) -> Result<(), CoachError> {
    for photo in app.library.photos().await? {
        println!("{}  {}  {}", photo.id, photo.captured_at.to_rfc3339(), status(app, &photo).await?);
    }
    Ok(())
}

async fn status(app: &App, photo: &Photo) -> Result<&'static str, CoachError> {
    let status = match app.records.fetch_feedback(photo.id).await? {
        Some(feedback) if feedback.completed_content().is_some() => "analyzed",
        _ => "pending",
    };
    Ok(status)
}

//=========================================================================================
// Terminal Output
//=========================================================================================

/// Starts printing from the text the session shows right now.
fn spawn_printer(session: &FeedbackSession) -> JoinHandle<()> {
    let states = session.subscribe();
    let on_screen = states.borrow().display_text().to_string();
    tokio::spawn(async move {
        print_progress(states, on_screen, std::io::stdout()).await;
    })
}

async fn finish(
    session: FeedbackSession,
    printer: JoinHandle<()>,
) -> Result<(), CoachError> {
    let outcome = session.state();
    // Dropping the session closes the channel so the printer can drain and exit.
    drop(session);
    printer
        .await
        .map_err(|e| CoachError::Internal(e.to_string()))?;

    match outcome {
        FeedbackState::Error(message) => Err(CoachError::Feedback(message)),
        _ => Ok(()),
    }
}
