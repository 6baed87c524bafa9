//! Консоль pubwait.
//!
//! Поднимает сессию поверх внутрипроцессного транспорта и выполняет
//! команды слоя запросов: одиночную (`exec`) или в REPL (`interactive`).

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pubwait::{
    handlers::{self, Reply},
    init_logging, LocalTransport, Session, Settings,
};
use rustyline::{error::ReadlineError, DefaultEditor};
use serde_json::Value;
use tracing::debug;

/// Аргументы командной строки.
#[derive(Parser)]
#[command(name = "pubwait")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "pubwait - blocking waits over a pub/sub session", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Файл настроек (TOML/JSON/YAML)
    #[arg(short, long, env = "PUBWAIT_CONFIG", help = "Путь к файлу настроек")]
    config: Option<PathBuf>,
    /// Включить подробный вывод (debug)
    #[arg(short, long, help = "Включить подробный вывод для отладки")]
    verbose: bool,
    /// Только ошибки
    #[arg(short = 'q', long, help = "Подавить логирование (только error)")]
    quiet: bool,
    /// Подкоманда для выполнения
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Подкоманды CLI
#[derive(Subcommand)]
enum Commands {
    /// Интерактивный режим (REPL)
    #[command(alias = "i")]
    Interactive {
        /// Файл истории команд
        #[arg(long, help = "Файл для сохранения истории команд")]
        history: Option<PathBuf>,
    },
    /// Выполнить одну команду и выйти
    #[command(alias = "e")]
    Exec {
        /// Команда с аргументами
        #[arg(required = true, help = "Команда для выполнения (например, 'add news')")]
        args: Vec<String>,
    },
}

/// Команда консоли.
#[derive(Debug, Clone, PartialEq)]
enum ConsoleCommand {
    Publish {
        channel: String,
        payload: Option<Value>,
    },
    Add(Vec<String>),
    Remove(Vec<String>),
    List,
    Listen(Option<Duration>),
    Presence(Option<Duration>),
    Key,
    StatusChannel,
    Help,
    Quit,
}

const HELP: &str = "\
publish <channel> [payload]   publish a message (payload is JSON or plain text)
add <channel...>              subscribe to channels
remove <channel...>           unsubscribe from channels
list                          list subscribed channels
listen [timeout-ms]           wait for the next message (408 on timeout)
presence [timeout-ms]         wait for the next presence event (408 on timeout)
key                           show the session key
status-channel                show the status channel
help | quit";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.config.as_deref()).context("Не удалось загрузить настройки")?;
    if cli.quiet {
        settings.logging.level = "error".to_string();
    } else if cli.verbose {
        settings.logging.level = "debug".to_string();
    }

    let logging = init_logging(settings.logging.clone())?;

    let transport = Arc::new(LocalTransport::new(settings.transport_config()));
    let session = Session::new(transport.clone(), settings.session_config())
        .context("Не удалось создать сессию")?;
    debug!(session = %session.id(), "session ready");

    let console = Console {
        session: &session,
        default_timeout: settings.default_timeout(),
    };
    let outcome = match &cli.command {
        Some(Commands::Exec { args }) => console.execute_line(args).map(|_| ()),
        Some(Commands::Interactive { history }) => console.interactive(history.as_ref()),
        None => console.interactive(None),
    };

    drop(session);
    transport.shutdown();
    logging.shutdown();
    outcome
}

/// Сессия консоли и таймаут ожиданий без явного аргумента.
struct Console<'a> {
    session: &'a Session,
    default_timeout: Duration,
}

impl Console<'_> {
    /// Интерактивный режим (REPL)
    fn interactive(
        &self,
        history: Option<&PathBuf>,
    ) -> Result<()> {
        println!(
            "pubwait {} (session {})",
            env!("CARGO_PKG_VERSION"),
            self.session.id()
        );
        println!("type 'help' for commands");

        let mut editor = DefaultEditor::new().context("Не удалось запустить редактор строки")?;
        if let Some(path) = history {
            // Отсутствующий файл истории не ошибка
            let _ = editor.load_history(path);
        }

        loop {
            match editor.readline("pubwait> ") {
                Ok(line) => {
                    let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
                    if args.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line.as_str());
                    match self.execute_line(&args) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => eprintln!("Error: {e}"),
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => return Err(e).context("Ошибка чтения строки"),
            }
        }

        if let Some(path) = history {
            editor
                .save_history(path)
                .with_context(|| format!("Не удалось сохранить историю в {}", path.display()))?;
        }
        Ok(())
    }

    /// Разбирает и выполняет одну строку. `false`: пользователь завершил
    /// сеанс.
    fn execute_line(
        &self,
        args: &[String],
    ) -> Result<bool> {
        match parse_command(args)? {
            ConsoleCommand::Quit => Ok(false),
            ConsoleCommand::Help => {
                println!("{HELP}");
                Ok(true)
            }
            command => {
                print_reply(&self.execute(command))?;
                Ok(true)
            }
        }
    }

    fn execute(
        &self,
        command: ConsoleCommand,
    ) -> Reply {
        let session = self.session;
        match command {
            ConsoleCommand::Publish { channel, payload } => {
                handlers::publish_sync(session, &[channel], payload)
            }
            ConsoleCommand::Add(channels) => handlers::add_channel(session, &channels),
            ConsoleCommand::Remove(channels) => handlers::remove_channel(session, &channels),
            ConsoleCommand::List => handlers::index(session),
            ConsoleCommand::Listen(timeout) => {
                handlers::listen_timeout(session, timeout.unwrap_or(self.default_timeout))
            }
            ConsoleCommand::Presence(timeout) => {
                handlers::presence(session, timeout.unwrap_or(self.default_timeout))
            }
            ConsoleCommand::Key => handlers::app_key(session),
            ConsoleCommand::StatusChannel => handlers::status_channel(session),
            ConsoleCommand::Help | ConsoleCommand::Quit => Reply::ok(Value::Null),
        }
    }
}

fn parse_command(args: &[String]) -> Result<ConsoleCommand> {
    let Some((name, rest)) = args.split_first() else {
        bail!("Не указана команда");
    };

    let command = match name.to_lowercase().as_str() {
        "publish" | "pub" => {
            let Some((channel, payload)) = rest.split_first() else {
                bail!("Использование: publish <канал> [сообщение]");
            };
            let payload = (!payload.is_empty()).then(|| parse_payload(&payload.join(" ")));
            ConsoleCommand::Publish {
                channel: channel.clone(),
                payload,
            }
        }
        "add" | "subscribe" => ConsoleCommand::Add(rest.to_vec()),
        "remove" | "unsubscribe" => ConsoleCommand::Remove(rest.to_vec()),
        "list" | "index" => ConsoleCommand::List,
        "listen" => ConsoleCommand::Listen(parse_timeout("listen", rest)?),
        "presence" => ConsoleCommand::Presence(parse_timeout("presence", rest)?),
        "key" | "app-key" => ConsoleCommand::Key,
        "status-channel" => ConsoleCommand::StatusChannel,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("Неизвестная команда: {other}. Введите 'help'"),
    };
    Ok(command)
}

/// Необязательный таймаут в миллисекундах.
fn parse_timeout(
    command: &str,
    rest: &[String],
) -> Result<Option<Duration>> {
    match rest {
        [] => Ok(None),
        [ms] => {
            let ms: u64 = ms.parse().context("Таймаут должен быть числом миллисекунд")?;
            Ok(Some(Duration::from_millis(ms)))
        }
        _ => bail!("Использование: {command} [таймаут-мс]"),
    }
}

/// JSON, если строка разбирается, иначе обычная строка.
fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw))
}

fn print_reply(reply: &Reply) -> Result<()> {
    let body = serde_json::to_string_pretty(&reply.body)?;
    if reply.is_success() {
        println!("{body}");
    } else {
        println!("({}) {body}", reply.status);
    }
    Ok(())
}
