use crate::brain::classifier::IntentModel;
use crate::brain::responder::Responder;
use crate::error::AppError;
use std::io::{BufRead, Write};
use tracing::{info, warn};

const USER_PROMPT: &str = "you > ";
const BOT_PROMPT: &str = "bot > ";

/// Interactive chat loop. Reads one sentence per line until EOF.
///
/// A request that fails (e.g. a tag without answers) is logged and skipped;
/// I/O errors end the loop.
pub fn run_console<M, I, O>(responder: &Responder<M>, input: I, mut output: O) -> Result<usize, AppError>
where
    M: IntentModel,
    I: BufRead,
    O: Write,
{
    let mut lines = input.lines();
    let mut exchanges = 0;

    loop {
        write!(output, "{}", USER_PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let line = line?;
        let sentence = line.trim();

        // blank lines are answered too; they resolve to the fallback
        match responder.answer(sentence) {
            Ok(answer) => {
                writeln!(output, "{}{}", BOT_PROMPT, answer)?;
                exchanges += 1;
            }
            Err(e) => warn!("No answer for {:?}: {}", sentence, e),
        }
    }

    info!("Console closed after {} exchanges", exchanges);
    Ok(exchanges)
}
