//! Filter command: materialize a template from the command line.

use crate::cli::FilterArgs;
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::template::{self, TemplateFilter, TextEncoding};
use serde_json::json;

/// Execute the filter command.
///
/// # Errors
///
/// Unknown encoding, unbound placeholders, I/O failures.
pub fn execute(args: &FilterArgs, config: &HarnessConfig, json: bool) -> Result<()> {
    let cwd = super::current_dir()?;
    let encoding: TextEncoding = args.encoding.parse()?;
    let basedir = args.basedir.clone().unwrap_or_else(|| cwd.clone());

    let mut props = template::default_properties(&basedir, &config.local_repo);
    props.extend(args.defines.iter().cloned());

    let written = TemplateFilter::new(&cwd).filter_file(&args.template, &args.output, encoding, &props)?;

    if json {
        let payload = json!({
            "template": args.template,
            "output": written,
            "encoding": encoding.name(),
            "properties": props,
        });
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!("Wrote {} ({encoding})", written.display());
    }
    Ok(())
}
