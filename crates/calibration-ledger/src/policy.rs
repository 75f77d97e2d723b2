/// Multiplier policy from realized win rate and average P&L.
///
/// The ladder rewards sectors that have historically confirmed our calls
/// and discounts those that have not. A negative average P&L caps the
/// multiplier at 0.95 regardless of win rate: a lucky-but-unprofitable
/// history must not inflate confidence.
pub fn multiplier_for(win_rate: f64, avg_pnl: f64) -> f64 {
    let base: f64 = if win_rate > 65.0 {
        1.15
    } else if win_rate > 55.0 {
        1.05
    } else if win_rate < 35.0 {
        0.85
    } else if win_rate < 45.0 {
        0.95
    } else {
        1.0
    };

    if avg_pnl < 0.0 {
        base.min(0.95)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_boundaries() {
        assert_eq!(multiplier_for(70.0, 1.0), 1.15);
        assert_eq!(multiplier_for(60.0, 1.0), 1.05);
        assert_eq!(multiplier_for(50.0, 1.0), 1.0);
        assert_eq!(multiplier_for(40.0, 1.0), 0.95);
        assert_eq!(multiplier_for(30.0, 1.0), 0.85);
    }

    #[test]
    fn negative_pnl_caps_the_multiplier() {
        // Lucky but unprofitable: high win rate, losing on average
        assert_eq!(multiplier_for(70.0, -0.5), 0.95);
        assert_eq!(multiplier_for(60.0, -0.5), 0.95);
        // Already below the cap: unchanged
        assert_eq!(multiplier_for(30.0, -0.5), 0.85);
    }
}
