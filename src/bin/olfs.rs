//! `olfs`: browse and edit Overleaf projects from the command line.
//!
//! Paths are `<project>/<path inside project>`; a leading `/` is accepted.
//!
//! Usage:
//!   olfs --cookie "overleaf_session2=..." ls
//!   olfs --cookie-file cookies.txt ls Paper/sections
//!   olfs mkdir -p Paper/figures/plots
//!   olfs read Paper/main.tex > main.tex
//!   cat refs.bib | olfs write Paper/refs.bib
//!   olfs rm Paper/old.tex
//!   olfs download-project Paper paper.zip

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::{EnvFilter, fmt};

use overleaf_fs::config::DEFAULT_BASE_URL;
use overleaf_fs::fs::tree::split_project_path;
use overleaf_fs::{ClientConfig, OverleafError, ProjectFs, Result, Session};

#[derive(Parser, Debug)]
#[command(name = "olfs", version)]
#[command(about = "Work with Overleaf projects as a filesystem")]
struct Cli {
    /// Session cookies as a Cookie header ("name=value; name2=value2")
    #[arg(long, env = "OVERLEAF_COOKIE", hide_env_values = true, global = true)]
    cookie: Option<String>,

    /// Netscape cookies.txt export holding the session cookies
    #[arg(long, env = "OVERLEAF_COOKIE_FILE", global = true)]
    cookie_file: Option<PathBuf>,

    /// Service URL
    #[arg(long, env = "OVERLEAF_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// HTTP proxy for web and socket traffic
    #[arg(long, env = "OVERLEAF_PROXY", global = true)]
    proxy: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Network timeout in seconds
    #[arg(long, default_value_t = 16, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List projects, or the files in a project folder
    Ls {
        #[arg(default_value = ".")]
        path: String,
    },
    /// Create a folder in a project
    Mkdir {
        /// Create missing parent folders; an existing folder is not an error
        #[arg(short, long)]
        parents: bool,
        path: String,
    },
    /// Write a project file to standard output
    Read { path: String },
    /// Replace a project file with standard input
    Write { path: String },
    /// Remove a file or folder from a project
    Rm { path: String },
    /// Download a project as a zip archive
    DownloadProject { project: String, output: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("overleaf_fs=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let session = login(&cli)?;

    match cli.command {
        Command::Ls { path } => {
            if matches!(path.as_str(), "" | "." | "/") {
                for project in session.get_projects(false, false).await? {
                    println!("{}", project.name);
                }
            } else {
                let (fs, path) = open_project(&session, &path, false).await?;
                for name in fs.listdir(&path).await? {
                    println!("{}", name);
                }
            }
        }
        Command::Mkdir { parents, path } => {
            let (fs, path) = open_project(&session, &path, true).await?;
            fs.mkdir(&path, parents, parents).await?;
        }
        Command::Read { path } => {
            let (fs, path) = open_project(&session, &path, true).await?;
            let data = fs.read(&path).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
        Command::Write { path } => {
            let (fs, path) = open_project(&session, &path, true).await?;
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            fs.with_file(&path, "wb+", |file| {
                use std::io::Write;
                file.write_all(&data)?;
                Ok(())
            })
            .await?;
        }
        Command::Rm { path } => {
            let (fs, path) = open_project(&session, &path, true).await?;
            fs.remove(&path, false).await?;
        }
        Command::DownloadProject { project, output } => {
            let project = session.find_project_by_name(&project).await?;
            session.download_project_to(&project.id, &output).await?;
            println!("Project downloaded to {}", output.display());
        }
    }
    Ok(())
}

fn login(cli: &Cli) -> Result<Session> {
    let mut config = ClientConfig::new(&cli.base_url)?
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_ssl_verify(!cli.insecure);
    if let Some(proxy) = &cli.proxy {
        config = config.with_proxy(proxy.clone());
    }

    let session = Session::new(config);
    match (&cli.cookie, &cli.cookie_file) {
        (Some(header), _) => session.login_from_cookie_header(header)?,
        (None, Some(path)) => session.login_from_cookie_file(path)?,
        (None, None) => {
            return Err(OverleafError::InvalidConfig(
                "no session cookies; pass --cookie or --cookie-file".to_string(),
            ));
        }
    }
    Ok(session)
}

async fn open_project(
    session: &Session,
    path: &str,
    require_inner_path: bool,
) -> Result<(ProjectFs, String)> {
    if require_inner_path && !path.trim_start_matches('/').contains('/') {
        return Err(OverleafError::InvalidPath(format!(
            "{}: expected <project>/<path>",
            path
        )));
    }
    let (name, inner) = split_project_path(path);
    let project = session.find_project_by_name(name).await?;
    Ok((ProjectFs::new(session.clone(), project.id), inner.to_string()))
}
