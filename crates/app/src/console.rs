use std::fmt::Write as _;
use std::io::BufRead;
use std::thread;

use quiz_core::format_remaining;
use quiz_core::model::{OptionMark, OptionOrder, QuestionId, Quiz, QuizResult, SessionStatus};
use services::{SessionHandle, SessionSnapshot};
use tokio::sync::watch;

/// A line typed by the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Select {
        question: QuestionId,
        order: OptionOrder,
    },
    Submit,
    Status,
    Quit,
}

pub fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let input = match command {
        "select" | "s" => {
            let question = words
                .next()
                .ok_or("usage: select <question-id> <order>")?
                .parse::<QuestionId>()
                .map_err(|e| e.to_string())?;
            let order = words
                .next()
                .ok_or("usage: select <question-id> <order>")?
                .parse::<OptionOrder>()
                .map_err(|e| e.to_string())?;
            Input::Select { question, order }
        }
        "submit" => Input::Submit,
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    if words.next().is_some() {
        return Err(format!("unexpected arguments after {command}"));
    }
    Ok(Some(input))
}

/// Read commands from stdin on a dedicated thread. End of input unmounts.
pub fn spawn_stdin_reader(
    handle: SessionHandle,
    updates: watch::Receiver<SessionSnapshot>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let sent = match parse_line(&line) {
                Ok(None) => Ok(()),
                Ok(Some(Input::Select { question, order })) => handle.select(question, order),
                Ok(Some(Input::Submit)) => handle.submit(),
                Ok(Some(Input::Status)) => {
                    println!("{}", render_status(&updates.borrow()));
                    Ok(())
                }
                Ok(Some(Input::Quit)) => {
                    let _ = handle.unmount();
                    return;
                }
                Err(message) => {
                    eprintln!("{message}");
                    Ok(())
                }
            };
            if sent.is_err() {
                return;
            }
        }
        let _ = handle.unmount();
    })
}

pub fn render_quiz(quiz: &Quiz) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} questions, {})",
        quiz.title(),
        quiz.questions().len(),
        format_remaining(quiz.time_limit_secs())
    );
    for question in quiz.questions() {
        let _ = writeln!(out, "\n[{}] {}", question.id, question.text);
        for option in &question.options {
            let _ = writeln!(out, "    {}. {}", option.order, option.text);
        }
    }
    out
}

pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let mut line = format!(
        "{}: {} left, {}/{} answered",
        snapshot.status,
        format_remaining(snapshot.remaining_secs),
        snapshot.answered,
        snapshot.total
    );
    if let Some(error) = &snapshot.error {
        let _ = write!(line, " ({error})");
    }
    line
}

/// Whether a countdown value deserves a line of output.
pub fn is_milestone(remaining_secs: u32) -> bool {
    remaining_secs > 0 && (remaining_secs % 60 == 0 || remaining_secs <= 10)
}

/// Print countdown milestones and status changes until the session ends.
pub async fn follow_updates(mut updates: watch::Receiver<SessionSnapshot>) {
    let mut last = updates.borrow_and_update().clone();
    while updates.changed().await.is_ok() {
        let current = updates.borrow_and_update().clone();
        if current.status != last.status {
            println!("{}", render_status(&current));
        } else if current.status == SessionStatus::InProgress
            && current.remaining_secs != last.remaining_secs
            && is_milestone(current.remaining_secs)
        {
            println!("{} left", format_remaining(current.remaining_secs));
        }
        last = current;
    }
}

pub fn render_result(result: &QuizResult) -> String {
    let summary = result.summary();
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.title);
    let _ = writeln!(
        out,
        "Score: {}/{} ({}%), {} correct, {} wrong, {} skipped",
        result.obtained_marks,
        result.total_marks,
        summary.score_percent,
        summary.correct,
        summary.wrong,
        summary.skipped
    );
    for question in &result.questions {
        let _ = writeln!(out, "\n[{}] {}", question.id, question.text);
        for option in &question.options {
            let marker = match result.mark(question, option) {
                OptionMark::SelectedCorrect => "[x]",
                OptionMark::SelectedWrong => "[!]",
                OptionMark::Correct => "[*]",
                OptionMark::Neutral => "[ ]",
            };
            let _ = writeln!(out, "  {marker} {}. {}", option.order, option.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{GradedOption, GradedQuestion, OptionId};
    use std::collections::BTreeMap;

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_line("select 3 2").unwrap(),
            Some(Input::Select {
                question: QuestionId::new(3),
                order: OptionOrder::new(2)
            })
        );
        assert_eq!(parse_line("  submit ").unwrap(), Some(Input::Submit));
        assert_eq!(parse_line("status").unwrap(), Some(Input::Status));
        assert_eq!(parse_line("quit").unwrap(), Some(Input::Quit));
        assert_eq!(parse_line("").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse_line("select 3").is_err());
        assert!(parse_line("select x 1").is_err());
        assert!(parse_line("submit now").is_err());
        assert!(parse_line("skip").is_err());
    }

    #[test]
    fn milestones_are_whole_minutes_and_final_seconds() {
        assert!(is_milestone(600));
        assert!(is_milestone(60));
        assert!(is_milestone(10));
        assert!(is_milestone(1));
        assert!(!is_milestone(59));
        assert!(!is_milestone(0));
    }

    #[test]
    fn status_line_shows_countdown() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::InProgress,
            remaining_secs: 65,
            answered: 1,
            total: 4,
            result_id: None,
            error: None,
        };
        assert_eq!(
            render_status(&snapshot),
            "in progress: 1m:05s left, 1/4 answered"
        );
    }

    #[test]
    fn result_marks_selected_and_correct_options() {
        let option = |id: u64, order: u32, is_correct: bool| GradedOption {
            id: OptionId::new(id),
            text: format!("Option {order}"),
            order: OptionOrder::new(order),
            is_correct,
        };
        let result = QuizResult {
            title: "Traits".into(),
            obtained_marks: 0,
            total_marks: 1,
            selections: BTreeMap::from([(QuestionId::new(1), OptionOrder::new(1))]),
            questions: vec![GradedQuestion {
                id: QuestionId::new(1),
                text: "Pick one".into(),
                options: vec![option(1, 1, false), option(2, 2, true)],
            }],
        };

        let rendered = render_result(&result);
        assert!(rendered.contains("Score: 0/1 (0%)"));
        assert!(rendered.contains("[!] 1. Option 1"));
        assert!(rendered.contains("[*] 2. Option 2"));
    }
}
