//! Word ordering against the remote gameplay service: put the shuffled words
//! back into a sentence, level after level.

pub mod api;
pub mod controller;

use std::io::{BufRead, Write};

pub use api::{
    AnswerCheck, GameplayApi, GameplayData, HttpGameplayApi, LevelStats, ResultsData,
    ResultsPayload,
};
pub use controller::{CheckOutcome, LivesPolicy, WordOrderingSession, WordStatus};

use crate::runtime::Clock;
use crate::Result;

const HELP: &str = "N select word N   -N put back word N   c check   q quit";

/// Line-driven front end: prints the board and reads one command per line
/// until the gameplay ends, the input runs out or the player quits.
pub fn run_lines<A, R, W>(
    session: &mut WordOrderingSession<A>,
    clock: &dyn Clock,
    input: R,
    out: &mut W,
) -> Result<()>
where
    A: GameplayApi,
    R: BufRead,
    W: Write,
{
    if let Err(e) = session.load(clock.now_ms()) {
        writeln!(out, "could not load the gameplay: {e}")?;
        return Err(e);
    }
    writeln!(out, "{HELP}")?;
    print_board(session, out)?;

    for line in input.lines() {
        let line = line?;
        let command = line.trim();
        let now = clock.now_ms();
        match command {
            "q" => break,
            "c" => match session.check(now) {
                Ok(outcome) => writeln!(out, "{}", describe(outcome))?,
                Err(e) => writeln!(out, "could not check the answer: {e}")?,
            },
            _ => {
                let moved = match command.strip_prefix('-') {
                    Some(n) => n
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .is_some_and(|i| session.deselect(i)),
                    None => command
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .is_some_and(|i| session.select(i, now)),
                };
                if !moved {
                    writeln!(out, "{HELP}")?;
                }
            }
        }
        if session.is_finished() {
            break;
        }
        print_board(session, out)?;
    }

    writeln!(
        out,
        "score {}  levels completed {}  errors {}  accuracy {:.1}%",
        session.total_score(),
        session.levels_completed(),
        session.total_errors(),
        session.syntactic_accuracy()
    )?;
    Ok(())
}

fn describe(outcome: CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Correct { finished: true } => "correct! every level is done".to_string(),
        CheckOutcome::Correct { finished: false } => "correct! on to the next level".to_string(),
        CheckOutcome::Retry { lives_left } => format!("not quite, {lives_left} lives left"),
        CheckOutcome::Regressed => "out of lives, back one level".to_string(),
        CheckOutcome::GameOver => "out of lives, game over".to_string(),
    }
}

fn print_board<A: GameplayApi, W: Write>(
    session: &WordOrderingSession<A>,
    out: &mut W,
) -> Result<()> {
    let numbered = |words: &[String]| {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{}:{w}", i + 1))
            .collect::<Vec<_>>()
            .join("  ")
    };
    writeln!(
        out,
        "level {}  lives {}  score {}",
        session.level_number().unwrap_or(0),
        session.lives(),
        session.total_score()
    )?;
    writeln!(out, "words:    {}", numbered(session.available()))?;
    writeln!(out, "sentence: {}", numbered(session.selected()))?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::FakeApi;
    use super::*;
    use crate::runtime::ManualClock;
    use assert_matches::assert_matches;

    const ANSWER: &str = "the cat sat down";

    fn session(level: u32) -> WordOrderingSession<FakeApi> {
        WordOrderingSession::new(FakeApi::new(level, ANSWER), LivesPolicy::ResetPerLevel, Some(1))
    }

    /// Select the words in answer order.
    fn solve(s: &mut WordOrderingSession<FakeApi>, now: u64) {
        for word in ANSWER.split(' ') {
            let idx = s.available().iter().position(|w| w == word).unwrap();
            assert!(s.select(idx, now));
        }
    }

    #[test]
    fn load_shuffles_the_level_words() {
        let mut s = session(1);
        s.load(0).unwrap();
        assert_eq!(s.status(), &WordStatus::Ready);
        assert_eq!(s.level_number(), Some(1));
        assert_eq!(s.game_name(), Some("Cosmos Reader"));
        let mut words = s.available().to_vec();
        words.sort();
        assert_eq!(words, vec!["cat", "down", "sat", "the"]);
    }

    #[test]
    fn failed_load_is_reported_and_sticks() {
        let mut api = FakeApi::new(1, ANSWER);
        api.fail_fetch = true;
        let mut s = WordOrderingSession::new(api, LivesPolicy::ResetPerLevel, Some(1));
        assert_matches!(s.load(0), Err(crate::Error::Api { status: 404, .. }));
        assert_matches!(s.status(), WordStatus::Failed(msg) if msg.contains("no more levels"));
        assert!(!s.select(0, 10));
        assert!(s.check(10).is_err());
    }

    #[test]
    fn select_and_deselect_move_words_between_lists() {
        let mut s = session(1);
        s.load(0).unwrap();
        let first = s.available()[0].clone();
        assert!(s.select(0, 500));
        assert_eq!(s.selected(), &[first.clone()]);
        assert_eq!(s.available().len(), 3);
        assert!(!s.select(9, 600));
        assert!(s.deselect(0));
        assert!(s.selected().is_empty());
        assert_eq!(s.available().last(), Some(&first));
    }

    #[test]
    fn correct_answer_posts_stats_and_advances() {
        let mut s = session(3);
        s.load(1_000).unwrap();
        solve(&mut s, 2_000);
        let outcome = s.check(5_000).unwrap();
        assert_eq!(outcome, CheckOutcome::Correct { finished: false });
        assert_eq!(s.total_score(), 100);
        assert_eq!(s.level_number(), Some(4));
        assert!(s.selected().is_empty());

        let results = s.api().results.borrow();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 100);
        assert_matches!(
            &results[0].results_data,
            ResultsData::Level(LevelStats {
                completed_level: 3,
                time_taken_ms: 4_000,
                first_attempt_success: true,
                first_interaction_ms: 1_000,
                ..
            })
        );
        if let ResultsData::Level(stats) = &results[0].results_data {
            assert_eq!(stats.efficiency_score, 25.0);
        }
        let calls: Vec<_> = s.api().calls.borrow().iter().cloned().collect();
        assert_eq!(calls, ["data", "check-answer", "results", "advance", "data"]);
    }

    #[test]
    fn last_level_completes_the_gameplay() {
        let mut s = session(20);
        s.load(0).unwrap();
        solve(&mut s, 100);
        assert_eq!(
            s.check(2_000).unwrap(),
            CheckOutcome::Correct { finished: true }
        );
        assert_eq!(s.status(), &WordStatus::Completed);
        assert!(!s.api().calls.borrow().contains(&"advance".to_string()));
    }

    #[test]
    fn wrong_answers_cost_lives_then_end_low_levels() {
        let mut s = session(5);
        s.load(0).unwrap();
        assert!(s.select(0, 10));
        assert_eq!(s.check(100).unwrap(), CheckOutcome::Retry { lives_left: 2 });
        assert_eq!(s.check(200).unwrap(), CheckOutcome::Retry { lives_left: 1 });
        assert_eq!(s.check(300).unwrap(), CheckOutcome::GameOver);
        assert_eq!(s.status(), &WordStatus::GameOver);

        let results = s.api().results.borrow();
        let last = results.last().unwrap();
        assert_eq!(last.score, 0);
        assert_matches!(
            &last.results_data,
            ResultsData::GameOver(stats) if stats.status == "game_over"
                && stats.reached_level == 5
                && stats.last_completed_level_stats.is_none()
        );
    }

    #[test]
    fn failed_save_still_counts_the_level_once() {
        let api = FakeApi::new(3, ANSWER);
        *api.failing_saves.borrow_mut() = 1;
        let mut s = WordOrderingSession::new(api, LivesPolicy::ResetPerLevel, Some(1));
        s.load(0).unwrap();
        solve(&mut s, 100);
        assert_eq!(
            s.check(1_000).unwrap(),
            CheckOutcome::Correct { finished: false }
        );
        assert_eq!(s.total_score(), 100);
        assert_eq!(s.levels_completed(), 1);
        assert_eq!(s.level_number(), Some(4));
        assert!(s.selected().is_empty());
        assert!(s.api().results.borrow().is_empty());

        solve(&mut s, 1_100);
        s.check(2_000).unwrap();
        assert_eq!(s.total_score(), 200);
        assert_eq!(s.levels_completed(), 2);
        assert_eq!(s.api().results.borrow().len(), 1);
    }

    #[test]
    fn failed_advance_abandons_the_session() {
        let mut api = FakeApi::new(3, ANSWER);
        api.fail_advance = true;
        let mut s = WordOrderingSession::new(api, LivesPolicy::ResetPerLevel, Some(1));
        s.load(0).unwrap();
        solve(&mut s, 100);
        assert_matches!(s.check(1_000), Err(crate::Error::Api { status: 409, .. }));
        assert_matches!(s.status(), WordStatus::Failed(msg) if msg.contains("gameplay closed"));
        assert!(s.is_finished());
        assert!(s.check(1_100).is_err());
        assert_eq!(s.levels_completed(), 1);
    }

    #[test]
    fn game_over_reports_errors_attempts_and_distractors() {
        let mut api = FakeApi::new(2, ANSWER);
        api.distractors = 1;
        let mut s = WordOrderingSession::new(api, LivesPolicy::CarryOver, Some(1));
        s.load(0).unwrap();
        solve(&mut s, 10);
        s.check(100).unwrap();
        for now in [200, 300, 400] {
            s.check(now).unwrap();
        }
        assert_eq!(s.status(), &WordStatus::GameOver);
        assert_eq!(s.total_errors(), 3);
        assert_eq!(s.total_attempts(), 4);
        assert_eq!(s.distractors_used(), 3);
        assert_eq!(s.syntactic_accuracy(), 25.0);

        let results = s.api().results.borrow();
        assert_matches!(
            &results[1].results_data,
            ResultsData::GameOver(stats) if stats.total_errors == 3
                && stats.total_attempts == 4
                && stats.distractors_used == 3
                && stats.syntactic_accuracy == 25.0
                && stats.levels_completed == 1
        );
    }

    #[test]
    fn running_out_of_lives_on_high_levels_regresses() {
        let mut s = session(12);
        s.load(0).unwrap();
        for _ in 0..2 {
            s.check(100).unwrap();
        }
        assert_eq!(s.check(200).unwrap(), CheckOutcome::Regressed);
        assert_eq!(s.lives(), 3);
        assert_eq!(s.level_number(), Some(11));
        assert_eq!(s.status(), &WordStatus::Ready);
    }

    #[test]
    fn carry_over_keeps_lives_between_levels() {
        let mut s =
            WordOrderingSession::new(FakeApi::new(2, ANSWER), LivesPolicy::CarryOver, Some(1));
        s.load(0).unwrap();
        s.check(10).unwrap();
        assert_eq!(s.lives(), 2);
        solve(&mut s, 20);
        s.check(30).unwrap();
        assert_eq!(s.level_number(), Some(3));
        assert_eq!(s.lives(), 2);

        let mut reset = session(2);
        reset.load(0).unwrap();
        reset.check(10).unwrap();
        solve(&mut reset, 20);
        reset.check(30).unwrap();
        assert_eq!(reset.lives(), 3);
    }

    #[test]
    fn second_attempt_success_is_not_first_attempt() {
        let mut s = session(1);
        s.load(0).unwrap();
        s.check(10).unwrap();
        solve(&mut s, 20);
        s.check(30).unwrap();
        assert_matches!(
            s.last_level_stats(),
            Some(LevelStats {
                first_attempt_success: false,
                ..
            })
        );
    }

    #[test]
    fn line_loop_plays_a_level() {
        let clock = ManualClock::new(0);
        // Same seed, same shuffle: a preview session tells us the word order.
        let mut preview = session(20);
        preview.load(0).unwrap();
        let mut remaining = preview.available().to_vec();
        let mut picks = Vec::new();
        for word in ANSWER.split(' ') {
            let idx = remaining.iter().position(|w| w == word).unwrap();
            picks.push((idx + 1).to_string());
            remaining.remove(idx);
        }

        let mut s = session(20);
        let script = format!("{}\nc\n", picks.join("\n"));
        let mut out = Vec::new();
        run_lines(&mut s, &clock, script.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("every level is done"), "{text}");
        assert!(text.contains("score 100"));
    }

    #[test]
    fn line_loop_reports_load_failures() {
        let clock = ManualClock::new(0);
        let mut api = FakeApi::new(1, ANSWER);
        api.fail_fetch = true;
        let mut s = WordOrderingSession::new(api, LivesPolicy::ResetPerLevel, Some(1));
        let mut out = Vec::new();
        assert!(run_lines(&mut s, &clock, &b""[..], &mut out).is_err());
        assert!(String::from_utf8(out).unwrap().contains("could not load"));
    }
}
