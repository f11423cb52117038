//! Validated, immutable description of one search instance.
//!
//! A [`Problem`] can only be built through the checks below, so solvers
//! never see an unsupported kind or an unusable parameter.

use std::fmt::{Display, Formatter};

use crate::{
    errors::{ProblemError, ProblemResult},
    interaction::Challenge,
    types::Fingerprint,
};

pub const MAX_ELEMENTS: i64 = 1_000_000;

/// Smallest grid with at least two passable interior cells.
pub const MIN_GRID_SIZE: i64 = 4;

pub const MAX_GRID_SIZE: i64 = 4_096;

pub const MAX_REFERENCE_HASH_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    SortedList { nb_elements: usize, order: SortOrder },
    ShortestPath { grid_size: u64, nb_blockers: u64 },
}

impl ChallengeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChallengeKind::SortedList { order: SortOrder::Ascending, .. } => "sorted_list",
            ChallengeKind::SortedList { order: SortOrder::Descending, .. } => "reverse_sorted_list",
            ChallengeKind::ShortestPath { .. } => "shortest_path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub challenge_id: Option<u64>,
    pub kind: ChallengeKind,
    pub last_solution_hash: String,
    pub fingerprint: Fingerprint,
}

impl Problem {
    pub fn sorted_list(
        last_solution_hash: &str,
        hash_prefix: &str,
        nb_elements: i64,
        order: SortOrder,
    ) -> ProblemResult<Self> {
        let nb_elements = check_range("nb_elements", nb_elements, 1, MAX_ELEMENTS)? as usize;
        Self::build(last_solution_hash, hash_prefix, ChallengeKind::SortedList { nb_elements, order })
    }

    pub fn shortest_path(
        last_solution_hash: &str,
        hash_prefix: &str,
        grid_size: i64,
        nb_blockers: i64,
    ) -> ProblemResult<Self> {
        let grid_size = check_range("grid_size", grid_size, MIN_GRID_SIZE, MAX_GRID_SIZE)?;
        let nb_blockers = check_range("nb_blockers", nb_blockers, 0, grid_size * grid_size)?;
        Self::build(last_solution_hash, hash_prefix, ChallengeKind::ShortestPath {
            grid_size: grid_size as u64,
            nb_blockers: nb_blockers as u64,
        })
    }

    fn build(last_solution_hash: &str, hash_prefix: &str, kind: ChallengeKind) -> ProblemResult<Self> {
        let valid_hash = !last_solution_hash.is_empty()
            && last_solution_hash.len() <= MAX_REFERENCE_HASH_LEN
            && last_solution_hash.bytes().all(|b| b.is_ascii_graphic());
        if !valid_hash {
            return Err(ProblemError::InvalidReferenceHash(last_solution_hash.to_string()));
        }

        Ok(Self {
            challenge_id: None,
            kind,
            last_solution_hash: last_solution_hash.to_string(),
            fingerprint: Fingerprint::parse(hash_prefix)?,
        })
    }

    pub fn with_challenge_id(mut self, challenge_id: Option<u64>) -> Self {
        self.challenge_id = challenge_id;
        self
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ChallengeKind::SortedList { nb_elements, .. } => {
                write!(f, "{}(nb_elements = {nb_elements}", self.kind.name())?
            }
            ChallengeKind::ShortestPath { grid_size, nb_blockers } => write!(
                f,
                "{}(grid_size = {grid_size}, nb_blockers = {nb_blockers}",
                self.kind.name()
            )?,
        }
        write!(f, ", prefix = {}, last = {})", self.fingerprint, self.last_solution_hash)
    }
}

impl TryFrom<Challenge> for Problem {
    type Error = ProblemError;

    fn try_from(challenge: Challenge) -> Result<Self, Self::Error> {
        let Challenge { challenge_id, challenge_name, last_solution_hash, hash_prefix, parameters } =
            challenge;

        let problem = match challenge_name.as_str() {
            "sorted_list" | "reverse_sorted_list" => {
                let order = if challenge_name == "sorted_list" {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                };
                let nb_elements =
                    parameters.nb_elements.ok_or(ProblemError::MissingParameter("nb_elements"))?;
                Problem::sorted_list(&last_solution_hash, &hash_prefix, nb_elements, order)?
            }
            "shortest_path" => {
                let grid_size =
                    parameters.grid_size.ok_or(ProblemError::MissingParameter("grid_size"))?;
                let nb_blockers =
                    parameters.nb_blockers.ok_or(ProblemError::MissingParameter("nb_blockers"))?;
                Problem::shortest_path(&last_solution_hash, &hash_prefix, grid_size, nb_blockers)?
            }
            _ => return Err(ProblemError::Unsupported(challenge_name)),
        };

        Ok(problem.with_challenge_id(challenge_id))
    }
}

fn check_range(name: &'static str, value: i64, min: i64, max: i64) -> ProblemResult<i64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ProblemError::OutOfRange { name, value, min, max })
    }
}
