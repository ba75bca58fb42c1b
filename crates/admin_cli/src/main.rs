use std::error::Error;

use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{Engine, GroupCmd, GroupKind};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "splitsphere_admin")]
#[command(about = "Admin utilities for SplitSphere (bootstrap users/groups, dev tokens)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./splitsphere.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Group(Group),
    Token(Token),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Registers a token subject (or renames an existing one).
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    /// Token subject (`sub` claim).
    #[arg(long)]
    subject: String,
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct Group {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create(GroupCreateArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Short,
    Long,
}

#[derive(Args, Debug)]
struct GroupCreateArgs {
    /// Subject of the owning user; must already exist.
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    #[arg(long, value_enum, default_value = "short")]
    kind: Kind,
    #[arg(long, default_value = "INR")]
    currency: String,
    #[arg(long)]
    member_limit: Option<u32>,
}

#[derive(Args, Debug)]
struct Token {
    #[command(subcommand)]
    command: TokenCommand,
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Mints a bearer token for local development.
    Mint(TokenMintArgs),
}

#[derive(Args, Debug)]
struct TokenMintArgs {
    #[arg(long)]
    subject: String,
    #[arg(long)]
    name: String,
    /// Must match the server's `auth.jwt_secret`.
    #[arg(long, env = "SPLITSPHERE__AUTH__JWT_SECRET")]
    secret: String,
    #[arg(long, env = "SPLITSPHERE__AUTH__ISSUER")]
    issuer: Option<String>,
    #[arg(long, default_value_t = 24)]
    ttl_hours: i64,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let db = connect_db(&cli.database_url).await?;
            let engine = Engine::builder().database(db).build().await?;
            let user = engine.resolve_user(&args.subject, &args.name).await?;
            println!("user {} ({}): id {}", user.name, user.external_id, user.id);
        }
        Command::Group(Group {
            command: GroupCommand::Create(args),
        }) => {
            let db = connect_db(&cli.database_url).await?;
            let engine = Engine::builder().database(db).build().await?;
            let owner = match engine.user_by_external_id(&args.owner).await {
                Ok(owner) => owner,
                Err(err) => {
                    eprintln!("user not found: {} ({err})", args.owner);
                    std::process::exit(1);
                }
            };

            let kind = match args.kind {
                Kind::Short => GroupKind::Short,
                Kind::Long => GroupKind::Long,
            };
            let mut cmd = GroupCmd::new(owner.id, args.name, kind).currency(args.currency);
            if let Some(limit) = args.member_limit {
                cmd = cmd.member_limit(limit);
            }
            let detail = engine.new_group(cmd).await?;
            println!(
                "created group: {} (id {}, invite code {})",
                detail.group.name, detail.group.id, detail.group.invite_code
            );
        }
        Command::Token(Token {
            command: TokenCommand::Mint(args),
        }) => {
            let config = server::AuthConfig {
                jwt_secret: args.secret,
                issuer: args.issuer,
                leeway_secs: 0,
            };
            let token = server::mint_token(
                &config,
                &args.subject,
                &args.name,
                chrono::Duration::hours(args.ttl_hours),
            )?;
            println!("{token}");
        }
    }

    Ok(())
}
