//! Line-oriented keyboard commands.

use anyhow::{Context, bail};
use drill_core::{parse_rate, parse_repeat};

pub const HELP: &str = "\
commands:
  <enter>          pause / resume
  p <n>            play chunk n (its own repeat count)
  a                play all chunks (global repeat)
  s                stop
  pause | resume
  rate <r>         playback rate, e.g. 0.75 or 1.5x
  repeat <n> <k>   play chunk n k times
  global <k>       repeat the whole list k times
  ls               list chunks
  st               show status
  h                this help
  q                quit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Toggle,
    /// 1-based chunk number as shown by `ls`.
    PlayChunk(usize),
    PlayAll,
    Pause,
    Resume,
    Stop,
    Rate(f64),
    Repeat { chunk: usize, count: u32 },
    GlobalRepeat(u32),
    List,
    Status,
    Help,
    Quit,
}

pub fn parse_intent(line: &str) -> anyhow::Result<Intent> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Intent::Toggle);
    };

    let intent = match command {
        "p" | "play" => Intent::PlayChunk(chunk_number(words.next())?),
        "a" | "all" => Intent::PlayAll,
        "pause" => Intent::Pause,
        "resume" => Intent::Resume,
        "s" | "stop" => Intent::Stop,
        "rate" => Intent::Rate(parse_rate(words.next().context("rate needs a value")?)),
        "repeat" => {
            let chunk = chunk_number(words.next())?;
            let count = parse_repeat(words.next().context("repeat needs a count")?);
            Intent::Repeat { chunk, count }
        }
        "global" => Intent::GlobalRepeat(parse_repeat(
            words.next().context("global needs a count")?,
        )),
        "ls" | "list" => Intent::List,
        "st" | "status" => Intent::Status,
        "h" | "help" | "?" => Intent::Help,
        "q" | "quit" | "exit" => Intent::Quit,
        other => bail!("unknown command {other:?}, try h"),
    };
    Ok(intent)
}

fn chunk_number(word: Option<&str>) -> anyhow::Result<usize> {
    let word = word.context("expected a chunk number")?;
    match word.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => bail!("chunk numbers start at 1, got {word:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_line_toggles() {
        assert_eq!(parse_intent("").unwrap(), Intent::Toggle);
        assert_eq!(parse_intent("   ").unwrap(), Intent::Toggle);
    }

    #[test]
    fn test_play_commands() {
        assert_eq!(parse_intent("p 3").unwrap(), Intent::PlayChunk(3));
        assert_eq!(parse_intent("play 12").unwrap(), Intent::PlayChunk(12));
        assert_eq!(parse_intent("a").unwrap(), Intent::PlayAll);
        assert!(parse_intent("p").is_err());
        assert!(parse_intent("p 0").is_err());
        assert!(parse_intent("p two").is_err());
    }

    #[test]
    fn test_numeric_arguments_are_coerced() {
        assert_eq!(parse_intent("rate 1.5x").unwrap(), Intent::Rate(1.5));
        assert_eq!(parse_intent("rate fast").unwrap(), Intent::Rate(1.0));
        assert_eq!(
            parse_intent("repeat 2 3x").unwrap(),
            Intent::Repeat { chunk: 2, count: 3 }
        );
        assert_eq!(parse_intent("global 0").unwrap(), Intent::GlobalRepeat(1));
        assert!(parse_intent("rate").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_intent("rewind").unwrap_err();
        assert!(err.to_string().contains("rewind"));
    }
}
