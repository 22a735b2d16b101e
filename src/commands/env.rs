// ABOUTME: Environment variable commands: set, rm, ls.
// ABOUTME: Values are sealed on request and shown as [ENCRYPTED] unless decryption is asked for.

use super::Context;
use keel::error::Result;

pub fn env_set(ctx: &Context, name: &str, value: &str, encrypt: bool) -> Result<()> {
    ctx.deployment.add_env_variable(name, value, encrypt)?;
    Ok(())
}

pub fn env_rm(ctx: &Context, names: &[String]) -> Result<()> {
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    ctx.deployment.remove_env_variables(&names)?;
    Ok(())
}

pub fn env_ls(ctx: &Context, decrypt: bool) -> Result<()> {
    for variable in ctx.deployment.env_variables(decrypt)? {
        println!("{variable}");
    }
    Ok(())
}
