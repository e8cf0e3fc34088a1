use anyhow::{Context, Result};
use staked_celo_governance::{
    composer::{compose_batch, encode_call, BatchFile},
    multisig::MultisigDriver,
};

use super::Session;
use crate::args::MultisigCommand;

pub(crate) fn handle_encode(
    session: &Session,
    contract: &str,
    signature: &str,
    args: &str,
) -> Result<()> {
    let payload = encode_call(&session.config.deployments, contract, signature, args)?;
    println!("{payload}");

    Ok(())
}

pub(crate) async fn handle_multisig(session: &Session, command: MultisigCommand) -> Result<()> {
    match command {
        MultisigCommand::Submit { batch } => {
            let steps = BatchFile::load(&batch)?.steps;
            let batch = compose_batch(&session.config.deployments, &steps)
                .with_context(|| format!("failed to compose {}", batch.display()))?;

            let driver = MultisigDriver::new(session.writer().await?);
            let id = driver.submit(&batch).await?;
            println!("submitted proposal {id} with {} calls", batch.len());
        }
        MultisigCommand::Confirm { id } => {
            let driver = MultisigDriver::new(session.writer().await?);
            println!("{}", driver.confirm(id).await?);
        }
        MultisigCommand::RevokeConfirmation { id } => {
            let driver = MultisigDriver::new(session.writer().await?);
            println!("{}", driver.revoke_confirmation(id).await?);
        }
        MultisigCommand::Schedule { id } => {
            let driver = MultisigDriver::new(session.writer().await?);
            println!("{}", driver.schedule(id).await?);
        }
        MultisigCommand::Execute { id } => {
            let driver = MultisigDriver::new(session.writer().await?);
            println!("{}", driver.execute(id).await?);
        }
        MultisigCommand::Status { id } => {
            let driver = MultisigDriver::new(session.reader().await?);
            let status = driver.status(id).await?;
            println!("proposal {}: {}", status.id, status.stage);
            for owner in status.confirmations {
                println!("  confirmed by {owner}");
            }
        }
        MultisigCommand::Owners => {
            let driver = MultisigDriver::new(session.reader().await?);
            for owner in driver.owners().await? {
                println!("{owner}");
            }
        }
    }

    Ok(())
}
