use ledger::Fill;
use serde::Serialize;

/// Profit factor reported when there are winning fills but no losing ones.
pub const UNBOUNDED_PROFIT_FACTOR: f64 = 9_999.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TradeCounts {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub ts: u64,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawdownPoint {
    pub ts: u64,
    pub drawdown: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub counts: TradeCounts,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_pnl: f64,
    pub win_rate_pct: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub max_drawdown: f64,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,
    pub equity: Vec<EquityPoint>,
    pub drawdown: Vec<DrawdownPoint>,
}

impl PerformanceStats {
    /// Builds realized-PnL statistics over `fills`, ordered by timestamp.
    /// Every fill counts as a trade; fee-only fills count as neither win nor loss.
    pub fn from_fills<'a>(fills: impl IntoIterator<Item = &'a Fill>) -> Self {
        let mut rows: Vec<(u64, f64)> = fills
            .into_iter()
            .map(|fill| (fill.ts, fill.realized_pnl))
            .collect();
        rows.sort_by_key(|(ts, _)| *ts);

        let mut stats = Self {
            counts: TradeCounts {
                trades: rows.len(),
                ..TradeCounts::default()
            },
            ..Self::default()
        };

        let mut cumulative = 0.0;
        let mut peak = f64::NEG_INFINITY;
        let mut win_run = 0;
        let mut loss_run = 0;

        for (ts, realized) in rows {
            cumulative += realized;
            peak = peak.max(cumulative);
            let drawdown = cumulative - peak;
            stats.max_drawdown = stats.max_drawdown.min(drawdown);
            stats.equity.push(EquityPoint {
                ts,
                equity: cumulative,
            });
            stats.drawdown.push(DrawdownPoint { ts, drawdown });

            if realized > 0.0 {
                stats.counts.wins += 1;
                stats.gross_profit += realized;
                win_run += 1;
                loss_run = 0;
                stats.longest_win_streak = stats.longest_win_streak.max(win_run);
            } else if realized < 0.0 {
                stats.counts.losses += 1;
                stats.gross_loss += realized;
                loss_run += 1;
                win_run = 0;
                stats.longest_loss_streak = stats.longest_loss_streak.max(loss_run);
            }
        }

        stats.net_pnl = stats.gross_profit + stats.gross_loss;

        let win_rate = if stats.counts.trades > 0 {
            stats.counts.wins as f64 / stats.counts.trades as f64
        } else {
            0.0
        };
        stats.win_rate_pct = win_rate * 100.0;
        if stats.counts.wins > 0 {
            stats.avg_win = stats.gross_profit / stats.counts.wins as f64;
        }
        if stats.counts.losses > 0 {
            stats.avg_loss = (stats.gross_loss / stats.counts.losses as f64).abs();
        }

        stats.profit_factor = if stats.gross_loss.abs() > 1e-12 {
            stats.gross_profit / stats.gross_loss.abs()
        } else if stats.gross_profit > 0.0 {
            UNBOUNDED_PROFIT_FACTOR
        } else {
            0.0
        };

        if stats.counts.wins + stats.counts.losses > 0 {
            stats.expectancy = win_rate * stats.avg_win - (1.0 - win_rate) * stats.avg_loss;
        }

        stats
    }
}
