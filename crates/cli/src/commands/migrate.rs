use crate::commands::{execute, open_database, CommandResult};

pub fn run() -> CommandResult {
    execute("migrate", |config| async move {
        let pool = open_database(&config).await?;
        pool.close().await;
        Ok(CommandResult::success("migrate", "applied pending migrations"))
    })
}
