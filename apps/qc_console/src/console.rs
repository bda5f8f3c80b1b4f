use std::{fmt::Write as _, path::PathBuf, str::FromStr};

use anyhow::{bail, Context, Result};
use command_core::{services::TemplateService, CommandManager, ServiceContext};
use shared::domain::{OrderId, PhotoId, TemplateId};
use storage::Storage;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  login <badge>                      sign in with an NFC badge id
  next <order>                       show the next template still needing a photo
  capture <order> <file> [template]  upload a photo (defaults to the next template)
  submit <order>                     mark the order completed
  approve <order> <photo>...         approve photos; approves a fully captured completed order
  status <order>                     order status, photos and missing templates
  undo | redo                        step through the command history
  history                            list undo and redo stacks
  limit <n>                          change the history bound
  clear                              drop all history
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Login(String),
    Next(OrderId),
    Capture {
        order: OrderId,
        file: PathBuf,
        template: Option<TemplateId>,
    },
    Submit(OrderId),
    Approve {
        order: OrderId,
        photos: Vec<PhotoId>,
    },
    Status(OrderId),
    Undo,
    Redo,
    History,
    Limit(usize),
    Clear,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("'{command}' needs <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("<{argument}> must be a number, got '{value}'")]
    InvalidNumber {
        argument: &'static str,
        value: String,
    },
    #[error("'{0}' takes no further arguments")]
    TrailingInput(&'static str),
}

struct Words<'a> {
    command: &'static str,
    rest: std::str::SplitWhitespace<'a>,
}

impl<'a> Words<'a> {
    fn required(&mut self, argument: &'static str) -> Result<&'a str, ParseError> {
        self.rest.next().ok_or(ParseError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn number<T: FromStr>(&mut self, argument: &'static str) -> Result<T, ParseError> {
        let value = self.required(argument)?;
        parse_number(argument, value)
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.rest.next() {
            Some(_) => Err(ParseError::TrailingInput(self.command)),
            None => Ok(()),
        }
    }
}

fn parse_number<T: FromStr>(argument: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        argument,
        value: value.to_string(),
    })
}

impl FromStr for ConsoleCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut rest = line.split_whitespace();
        let Some(head) = rest.next() else {
            return Err(ParseError::Empty);
        };
        let words = |command| Words { command, rest };

        let parsed = match head.to_ascii_lowercase().as_str() {
            "login" => {
                let mut w = words("login");
                let badge = w.required("badge")?.to_string();
                w.finish()?;
                Self::Login(badge)
            }
            "next" => {
                let mut w = words("next");
                let order = OrderId(w.number("order")?);
                w.finish()?;
                Self::Next(order)
            }
            "capture" => {
                let mut w = words("capture");
                let order = OrderId(w.number("order")?);
                let file = PathBuf::from(w.required("file")?);
                let template = match w.rest.next() {
                    Some(raw) => Some(TemplateId(parse_number("template", raw)?)),
                    None => None,
                };
                w.finish()?;
                Self::Capture {
                    order,
                    file,
                    template,
                }
            }
            "submit" => {
                let mut w = words("submit");
                let order = OrderId(w.number("order")?);
                w.finish()?;
                Self::Submit(order)
            }
            "approve" => {
                let mut w = words("approve");
                let order = OrderId(w.number("order")?);
                let photos = w
                    .rest
                    .map(|raw| parse_number("photo", raw).map(PhotoId))
                    .collect::<Result<Vec<_>, _>>()?;
                if photos.is_empty() {
                    return Err(ParseError::MissingArgument {
                        command: "approve",
                        argument: "photo",
                    });
                }
                Self::Approve { order, photos }
            }
            "status" => {
                let mut w = words("status");
                let order = OrderId(w.number("order")?);
                w.finish()?;
                Self::Status(order)
            }
            "limit" => {
                let mut w = words("limit");
                let size = w.number("n")?;
                w.finish()?;
                Self::Limit(size)
            }
            "undo" => words("undo").finish().map(|_| Self::Undo)?,
            "redo" => words("redo").finish().map(|_| Self::Redo)?,
            "history" => words("history").finish().map(|_| Self::History)?,
            "clear" => words("clear").finish().map(|_| Self::Clear)?,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(parsed)
    }
}

/// One inspection station wired to a single command history.
pub struct Console {
    storage: Storage,
    services: ServiceContext,
    manager: CommandManager,
}

impl Console {
    pub fn new(storage: Storage, manager: CommandManager) -> Self {
        Self {
            services: ServiceContext::from_storage(storage.clone()),
            storage,
            manager,
        }
    }

    pub fn manager(&self) -> &CommandManager {
        &self.manager
    }

    /// Runs one console command and renders its outcome.
    pub async fn run(&self, command: ConsoleCommand) -> Result<String> {
        let reply = match command {
            ConsoleCommand::Login(badge) => {
                match self.manager.execute(self.services.nfc_login(badge)).await? {
                    Some(user) => format!("signed in as {} (user {})", user.username, user.user_id),
                    None => "badge not recognized".to_string(),
                }
            }
            ConsoleCommand::Next(order) => {
                match self
                    .manager
                    .execute(self.services.fetch_next_template(order))
                    .await?
                {
                    Some(template) => format!(
                        "next: template {} '{}' (step {})",
                        template.template_id, template.name, template.sequence
                    ),
                    None => format!("order {order} has no missing templates"),
                }
            }
            ConsoleCommand::Capture {
                order,
                file,
                template,
            } => {
                let template = match template {
                    Some(template_id) => self
                        .services
                        .templates
                        .templates_for_order(order)
                        .await?
                        .into_iter()
                        .find(|t| t.template_id == template_id)
                        .with_context(|| {
                            format!("template {template_id} does not belong to order {order}")
                        })?,
                    None => match self
                        .manager
                        .execute(self.services.fetch_next_template(order))
                        .await?
                    {
                        Some(template) => template,
                        None => bail!("order {order} has no template left to capture"),
                    },
                };
                match self
                    .manager
                    .execute(self.services.capture_photo(file, order, template))
                    .await?
                {
                    Some(photo) => format!(
                        "captured photo {} '{}' ({} bytes)",
                        photo.photo_id, photo.filename, photo.size_bytes
                    ),
                    None => format!("order {order} not found, nothing captured"),
                }
            }
            ConsoleCommand::Submit(order) => {
                if self.manager.execute(self.services.submit_photos(order)).await? {
                    format!("order {order} submitted")
                } else {
                    format!("order {order} not found, nothing submitted")
                }
            }
            ConsoleCommand::Approve { order, photos } => {
                if self
                    .manager
                    .execute(self.services.approve_photos(order, photos))
                    .await?
                {
                    self.order_summary(order).await?
                } else {
                    format!("order {order} or one of its photos was not found")
                }
            }
            ConsoleCommand::Status(order) => self.order_summary(order).await?,
            ConsoleCommand::Undo => {
                let label = self.manager.peek_undo();
                self.manager.undo().await?;
                format!("undone: {}", label.unwrap_or_default())
            }
            ConsoleCommand::Redo => {
                let label = self.manager.peek_redo();
                self.manager.redo().await?;
                format!("redone: {}", label.unwrap_or_default())
            }
            ConsoleCommand::History => self.history(),
            ConsoleCommand::Limit(size) => {
                self.manager.set_max_history_size(size)?;
                format!(
                    "history bound set to {size}, {} undoable",
                    self.manager.undo_len()
                )
            }
            ConsoleCommand::Clear => {
                self.manager.clear_history();
                "history cleared".to_string()
            }
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => String::new(),
        };
        Ok(reply)
    }

    async fn order_summary(&self, order_id: OrderId) -> Result<String> {
        let Some(order) = self.storage.load_order(order_id).await? else {
            return Ok(format!("order {order_id} not found"));
        };
        let photos = self.storage.photos_for_order(order_id).await?;
        let missing = self.storage.missing_templates(order_id).await?;

        let mut out = format!(
            "order {} '{}' is {}, {} photo(s)",
            order.order_id,
            order.reference,
            order.status,
            photos.len()
        );
        if !missing.is_empty() {
            let names = missing
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(out, ", missing: {names}");
        }
        Ok(out)
    }

    fn history(&self) -> String {
        let mut out = format!("undo ({}):", self.manager.undo_len());
        for description in self.manager.undo_descriptions() {
            let _ = write!(out, "\n  {description}");
        }
        let _ = write!(out, "\nredo ({}):", self.manager.redo_len());
        for description in self.manager.redo_descriptions() {
            let _ = write!(out, "\n  {description}");
        }
        out
    }
}

/// Creates the demo inspector and order once; returns the order id.
pub async fn seed_demo_data(storage: &Storage) -> Result<OrderId> {
    const REFERENCE: &str = "QC-0001";

    storage.create_user("inspector", Some("0001")).await?;
    if let Some(order) = storage.order_by_reference(REFERENCE).await? {
        return Ok(order.order_id);
    }

    let order = storage.create_order(REFERENCE).await?;
    for (sequence, (name, required)) in [
        ("front", true),
        ("back", true),
        ("serial label", true),
        ("detail", false),
    ]
    .into_iter()
    .enumerate()
    {
        storage
            .create_template(order, name, sequence as i64 + 1, required)
            .await?;
    }
    Ok(order)
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
