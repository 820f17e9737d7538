//! The `init` subcommand: scaffold a starter project.

use std::path::Path;

use anyhow::Context;

const CONFIG_TEMPLATE: &str = "\
# PromptCheck global configuration.
# API keys can also come from <PROVIDER>_API_KEY environment variables,
# which take precedence over this file.
api_keys: {}

default_model:
  provider: openai
  model_name: gpt-4o-mini
  parameters:
    temperature: 0.0
    timeout_s: 30.0
    retry_attempts: 2
";

const EXAMPLE_SUITE: &str = "\
# Example PromptCheck test suite. Run with: promptcheck run
- id: greeting-mentions-hello
  name: Greeting mentions hello
  input:
    prompt: \"Say hello to {{name}} in one short sentence.\"
    variables:
      name: Ada
  expected:
    regex_pattern: \"(?i)hello\"
  metrics:
    - metric: regex_match
    - metric: latency
      threshold: 10000
    - metric: cost
  model:
    provider: default
";

/// Write the starter config and example test file. Existing files are
/// left untouched.
pub fn execute(dir: &Path) -> anyhow::Result<i32> {
    std::fs::create_dir_all(dir.join("tests"))
        .with_context(|| format!("creating {}", dir.join("tests").display()))?;

    scaffold(
        &dir.join(promptcheck_core::CONFIG_FILENAME),
        CONFIG_TEMPLATE,
    )?;
    scaffold(&dir.join("tests").join("example.yaml"), EXAMPLE_SUITE)?;

    println!("scaffolded; set OPENAI_API_KEY and try: promptcheck run");
    Ok(0)
}

fn scaffold(path: &Path, contents: &str) -> anyhow::Result<()> {
    if path.exists() {
        println!("exists, skipping: {}", path.display());
        return Ok(());
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    println!("created: {}", path.display());
    Ok(())
}
