//! Pluggable multiple-procedure ranking.
//!
//! The real CMS family-specific rule tables can replace [`StandardRanking`]
//! without touching the orchestrator; only the ranking seam is fixed.

use reference_data::Cents;

/// Orders the -51 lines of a plan for discounting. Input is
/// `(line position, unilateral allowed cents)`; output is the same
/// positions in discount order (first entry pays full).
pub trait ProcedureRanking: Send + Sync {
    fn rank(&self, lines: &[(usize, Cents)]) -> Vec<usize>;
}

/// Standard discounting order: highest unilateral allowed first, ties by
/// line position. First ranked line pays 100%, every subsequent line 50%.
pub struct StandardRanking;

impl ProcedureRanking for StandardRanking {
    fn rank(&self, lines: &[(usize, Cents)]) -> Vec<usize> {
        let mut ordered: Vec<(usize, Cents)> = lines.to_vec();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ordered.into_iter().map(|(pos, _)| pos).collect()
    }
}

/// Discount in basis points for the line at `rank` (0 = primary).
pub fn discount_bps(rank: usize) -> i64 {
    if rank == 0 {
        10_000
    } else {
        5_000
    }
}
