use clap::{Parser, Subcommand};
use mentorhub_common::DatabaseConfig;
use mentorhub_database::{create_pool, MigrationRunner, DEMO_MENTOR_USERNAME};

#[derive(Parser)]
#[command(name = "db-cli")]
#[command(about = "MentorHub Database CLI Tool")]
struct Cli {
    /// Database URL override
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Check migration status
    Status,
    /// Create the sample skill catalog (existing skills are kept)
    SeedSkills,
    /// Create the approved demo mentor account
    CreateDemoMentor {
        /// Password for the demo account
        #[arg(long, default_value = "password123")]
        password: String,
    },
    /// List accounts that have no email address
    UsersWithoutEmail,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentorhub_database=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = database_config(cli.database_url);
    let pool = create_pool(&config).await?;
    let runner = MigrationRunner::new(pool);

    match cli.command {
        Commands::Migrate => {
            runner.run_all_migrations().await?;
            println!("✅ Migrations completed successfully");
        }
        Commands::Status => {
            let status = runner.check_migration_status().await?;
            println!("📊 {}", status);

            if status.is_up_to_date {
                println!("✅ Database is up to date");
            } else {
                println!("⚠️  Database needs migration");
            }
        }
        Commands::SeedSkills => {
            let created = runner.seed_sample_skills().await?;
            if created.is_empty() {
                println!("All sample skills already exist");
            } else {
                println!("✅ Created {} skills: {}", created.len(), created.join(", "));
            }
        }
        Commands::CreateDemoMentor { password } => {
            if runner.create_demo_mentor(&password).await? {
                println!("✅ Created demo mentor '{}'", DEMO_MENTOR_USERNAME);
            } else {
                println!("Demo mentor '{}' already exists", DEMO_MENTOR_USERNAME);
            }
        }
        Commands::UsersWithoutEmail => {
            let users = runner.users_without_email().await?;
            if users.is_empty() {
                println!("✅ Every user has an email address");
            } else {
                println!("Found {} users without email addresses:", users.len());
                for user in users {
                    println!("  - {} (joined {})", user.username, user.created_at.format("%Y-%m-%d"));
                }
            }
        }
    }

    Ok(())
}

fn database_config(database_url: Option<String>) -> DatabaseConfig {
    let mut config = DatabaseConfig::from_env();
    if let Some(url) = database_url {
        config.url = Some(url);
    }
    config
}
