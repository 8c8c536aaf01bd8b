//! paydb-client - command-line test client for the paydb ledger API.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paydb_client::auth::ApiKey;
use paydb_client::config::Settings;
use paydb_client::error::{AuthErrorKind, ClientError, ClientResult, NotificationErrorKind};
use paydb_client::notify::{load_sender, Notification, NotificationSender};
use paydb_client::rest::RestClient;
use paydb_client::socket::{Session, SessionEvent, SessionHandle};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

const EXIT_NO_COMMAND: u8 = 1;

#[derive(Parser)]
#[command(name = "paydb-client")]
#[command(about = "Test client for the paydb REST API and websocket", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// The API KEY token
    #[arg(long, env = "PAYDB_API_KEY_TOKEN", global = true)]
    api_key_token: Option<String>,

    /// The API KEY secret
    #[arg(long, env = "PAYDB_API_KEY_SECRET", global = true, hide_env_values = true)]
    api_key_secret: Option<String>,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Commands {
    /// Listen to a websocket
    Websocket,

    /// Create an api key with your username and password
    ApiKeyCreate {
        /// email
        email: String,
        /// password
        password: String,
        /// the device name for the api key
        device_name: String,
    },

    /// Get the user info
    UserInfo,

    /// Create a transaction
    TransactionCreate {
        /// the transaction action
        action: String,
        /// the transaction recipient
        recipient: String,
        /// the transaction amount (integer, cents)
        amount: i64,
        /// the transaction attachment
        attachment: String,
    },

    /// Get transaction info
    TransactionInfo {
        /// the unique transaction token
        token: String,
    },

    /// Send a push notification to one device
    NotifyToken {
        /// the device registration token
        registration_token: String,
        title: String,
        body: String,
        /// image URL
        #[arg(long)]
        image: Option<String>,
    },

    /// Send a push notification to a topic
    NotifyTopic {
        topic: String,
        title: String,
        body: String,
        /// image URL
        #[arg(long)]
        image: Option<String>,
    },

    /// Subscribe a device to topics
    SubscribeTopics {
        /// the device registration token
        registration_token: String,
        /// topic names
        #[arg(required = true)]
        topics: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(command) = cli.command.as_ref() else {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        return ExitCode::from(EXIT_NO_COMMAND);
    };

    let settings = match &cli.config {
        Some(path) => match Settings::load(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error loading configuration: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!(base_url = %settings.api.base_url, socket_url = %settings.api.socket_url, "Target");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli, command, &settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("::ERROR::");
            println!("{}", e);
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, command: &Commands, settings: &Settings) -> ClientResult<()> {
    match command {
        Commands::Websocket => {
            println!(":: calling websocket..");
            websocket(settings, resolve_api_key(cli, settings)?).await
        }
        Commands::ApiKeyCreate {
            email,
            password,
            device_name,
        } => {
            println!(":: calling api_key_create..");
            let client = RestClient::from_config(&settings.api)?;
            let body = client.api_key_create(email, password, device_name).await?;
            println!("{}", body);
            Ok(())
        }
        Commands::UserInfo => {
            println!(":: calling user_info..");
            let api_key = resolve_api_key(cli, settings)?;
            let client = RestClient::from_config(&settings.api)?;
            println!("{}", client.user_info(&api_key).await?);
            Ok(())
        }
        Commands::TransactionCreate {
            action,
            recipient,
            amount,
            attachment,
        } => {
            println!(":: calling transaction_create..");
            let api_key = resolve_api_key(cli, settings)?;
            let client = RestClient::from_config(&settings.api)?;
            let body = client
                .transaction_create(&api_key, action, recipient, *amount, attachment)
                .await?;
            println!("{}", body);
            Ok(())
        }
        Commands::TransactionInfo { token } => {
            println!(":: calling transaction_info..");
            let api_key = resolve_api_key(cli, settings)?;
            let client = RestClient::from_config(&settings.api)?;
            println!("{}", client.transaction_info(&api_key, token).await?);
            Ok(())
        }
        Commands::NotifyToken {
            registration_token,
            title,
            body,
            image,
        } => {
            let sender = notification_sender(settings)?;
            sender
                .send_to_token(registration_token, &notification(title, body, image))
                .await?;
            println!("notification sent");
            Ok(())
        }
        Commands::NotifyTopic {
            topic,
            title,
            body,
            image,
        } => {
            let sender = notification_sender(settings)?;
            sender
                .send_to_topic(topic, &notification(title, body, image))
                .await?;
            println!("notification sent");
            Ok(())
        }
        Commands::SubscribeTopics {
            registration_token,
            topics,
        } => {
            let sender = notification_sender(settings)?;
            sender.subscribe_to_topics(registration_token, topics).await?;
            println!("subscribed to {} topic(s)", topics.len());
            Ok(())
        }
    }
}

/// Open the socket session and print events until it closes.
async fn websocket(settings: &Settings, api_key: ApiKey) -> ClientResult<()> {
    let (session, mut handle) = Session::polling(&settings.api, api_key)?;
    let (result, ()) = tokio::join!(session.run(), print_events(&mut handle));
    result
}

async fn print_events(handle: &mut SessionHandle) {
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(SessionEvent::Connected) => {
                    println!("connection established");
                }
                Some(SessionEvent::Info(data)) => println!("info event received: {}", data),
                Some(SessionEvent::Transaction(data)) => println!("tx event received: {}", data),
                Some(SessionEvent::Other { name, args }) => {
                    println!("{} event received: {:?}", name, args)
                }
                Some(SessionEvent::Disconnected(reason)) => {
                    println!("disconnected from server ({:?})", reason);
                    return;
                }
                None => return,
            },
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Interrupted, closing session");
                handle.close();
            }
        }
    }
}

/// Command-line key material wins over the config file.
fn resolve_api_key(cli: &Cli, settings: &Settings) -> ClientResult<ApiKey> {
    match (&cli.api_key_token, &cli.api_key_secret) {
        (Some(token), Some(secret)) => Ok(ApiKey::new(token.clone(), secret.as_bytes())),
        (Some(_), None) | (None, Some(_)) => Err(ClientError::Config {
            message: "--api-key-token and --api-key-secret must be given together".to_string(),
        }),
        (None, None) => match &settings.credentials {
            Some(credentials) => credentials.api_key(),
            None => Err(ClientError::Auth {
                kind: AuthErrorKind::MissingApiKey,
            }),
        },
    }
}

fn notification_sender(settings: &Settings) -> ClientResult<impl NotificationSender> {
    load_sender(&settings.notifications).ok_or(ClientError::Notification {
        kind: NotificationErrorKind::Disabled,
    })
}

fn notification(title: &str, body: &str, image: &Option<String>) -> Notification {
    let notification = Notification::new(title, body);
    match image {
        Some(image) => notification.with_image(image.clone()),
        None => notification,
    }
}

/// Initialize logging based on settings.
///
/// Logs go to stderr so command output on stdout stays clean.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
