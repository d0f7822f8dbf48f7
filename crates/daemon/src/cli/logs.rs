//! Log tailing for agent daemons.

use std::io::{Read, Seek, SeekFrom, Write};
use std::time::Duration;

use ap_domain::Config;

const FOLLOW_POLL: Duration = Duration::from_millis(500);

pub fn logs(config: &Config, agent: &str, lines: usize, follow: bool) -> anyhow::Result<()> {
    config.agent(agent)?;
    let path = config.log_path(agent);
    if !path.exists() {
        anyhow::bail!("no log for {agent} at {} (was it started?)", path.display());
    }

    let content = std::fs::read_to_string(&path)?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{line}");
    }

    if !follow {
        return Ok(());
    }

    let mut file = std::fs::File::open(&path)?;
    let mut offset = file.metadata()?.len();
    loop {
        std::thread::sleep(FOLLOW_POLL);
        let len = file.metadata()?.len();
        if len < offset {
            // Truncated or rotated; pick up from the top.
            offset = 0;
        }
        if len > offset {
            file.seek(SeekFrom::Start(offset))?;
            let mut fresh = String::new();
            (&mut file).take(len - offset).read_to_string(&mut fresh)?;
            print!("{fresh}");
            std::io::stdout().flush()?;
            offset = len;
        }
    }
}
