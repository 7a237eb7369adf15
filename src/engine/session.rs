// src/engine/session.rs

/// Third recorded mistake ends the playthrough, regardless of position.
pub const MISTAKE_LIMIT: u32 = 3;

/// How a finished playthrough ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed { score: u32 },
    Failed,
}

impl Outcome {
    /// Reported score. Failed playthroughs always report 0.
    pub fn score(&self) -> u32 {
        match self {
            Outcome::Passed { score } => *score,
            Outcome::Failed => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for an answer (selected option or matched transcript) to the
    /// question at `index`.
    AwaitingAnswer { index: usize },
    /// The question at `index` was answered; waiting for an explicit advance.
    Answered { index: usize, was_correct: bool },
    Finished(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// A playthrough needs at least one question.
    NoQuestions,
    /// `record_answer` called outside `AwaitingAnswer`.
    NotAwaitingAnswer,
    /// `advance` called outside `Answered`.
    NotAnswered,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            SessionError::NoQuestions => "quiz session requires at least one question",
            SessionError::NotAwaitingAnswer => "session is not awaiting an answer",
            SessionError::NotAnswered => "current question has not been answered",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for SessionError {}

/// One playthrough of a level.
///
/// Fully reconstructible from {total, current index, mistakes, correct_count};
/// the browser owns the live instance for the duration of the quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    total: usize,
    mistakes: u32,
    correct_count: u32,
    state: SessionState,
}

impl QuizSession {
    pub fn new(total_questions: usize) -> Result<Self, SessionError> {
        if total_questions == 0 {
            return Err(SessionError::NoQuestions);
        }
        Ok(Self {
            total: total_questions,
            mistakes: 0,
            correct_count: 0,
            state: SessionState::AwaitingAnswer { index: 0 },
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    /// Records the graded answer for the current question.
    ///
    /// The mistake cap is checked here: the playthrough fails on the spot once
    /// [`MISTAKE_LIMIT`] is reached, without waiting for an advance.
    pub fn record_answer(&mut self, was_correct: bool) -> Result<SessionState, SessionError> {
        let index = match self.state {
            SessionState::AwaitingAnswer { index } => index,
            _ => return Err(SessionError::NotAwaitingAnswer),
        };

        if was_correct {
            self.correct_count += 1;
            self.state = SessionState::Answered {
                index,
                was_correct: true,
            };
        } else {
            self.mistakes += 1;
            if self.mistakes >= MISTAKE_LIMIT {
                self.state = SessionState::Finished(Outcome::Failed);
            } else {
                self.state = SessionState::Answered {
                    index,
                    was_correct: false,
                };
            }
        }

        Ok(self.state)
    }

    /// Moves past an answered question: either to the next question or, after
    /// the last one, to the passed outcome with the percentage score.
    pub fn advance(&mut self) -> Result<SessionState, SessionError> {
        let index = match self.state {
            SessionState::Answered { index, .. } => index,
            _ => return Err(SessionError::NotAnswered),
        };

        if index + 1 < self.total {
            self.state = SessionState::AwaitingAnswer { index: index + 1 };
        } else {
            let score = (100.0 * self.correct_count as f64 / self.total as f64).round() as u32;
            self.state = SessionState::Finished(Outcome::Passed { score });
        }

        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(session: &mut QuizSession, answers: &[bool]) -> SessionState {
        for &correct in answers {
            let state = session.record_answer(correct).unwrap();
            if matches!(state, SessionState::Finished(_)) {
                return state;
            }
            let state = session.advance().unwrap();
            if matches!(state, SessionState::Finished(_)) {
                return state;
            }
        }
        session.state()
    }

    #[test]
    fn all_correct_passes_with_full_score() {
        let mut s = QuizSession::new(4).unwrap();
        let state = play(&mut s, &[true, true, true, true]);
        assert_eq!(state, SessionState::Finished(Outcome::Passed { score: 100 }));
    }

    #[test]
    fn all_wrong_below_cap_still_passes_with_zero() {
        let mut s = QuizSession::new(2).unwrap();
        let state = play(&mut s, &[false, false]);
        assert_eq!(state, SessionState::Finished(Outcome::Passed { score: 0 }));
        assert_eq!(Outcome::Passed { score: 0 }.score(), 0);
    }

    #[test]
    fn third_mistake_fails_immediately() {
        let mut s = QuizSession::new(10).unwrap();
        let state = play(&mut s, &[true, false, true, false, false]);
        assert_eq!(state, SessionState::Finished(Outcome::Failed));
        assert_eq!(s.mistakes(), MISTAKE_LIMIT);
        // Failed playthroughs report 0 no matter how many were correct.
        assert_eq!(Outcome::Failed.score(), 0);
    }

    #[test]
    fn partial_success_rounds_percentage() {
        let mut s = QuizSession::new(3).unwrap();
        let state = play(&mut s, &[true, true, false]);
        // 2/3 -> 66.67 -> 67
        assert_eq!(state, SessionState::Finished(Outcome::Passed { score: 67 }));
    }

    #[test]
    fn transitions_are_explicit() {
        let mut s = QuizSession::new(2).unwrap();
        assert_eq!(s.advance(), Err(SessionError::NotAnswered));
        s.record_answer(true).unwrap();
        assert_eq!(s.record_answer(true), Err(SessionError::NotAwaitingAnswer));
        s.advance().unwrap();
        assert_eq!(s.state(), SessionState::AwaitingAnswer { index: 1 });
    }

    #[test]
    fn empty_quiz_is_rejected() {
        assert_eq!(QuizSession::new(0).err(), Some(SessionError::NoQuestions));
    }
}
