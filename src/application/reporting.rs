//! Console output for ensemble decisions, scans and tuning runs.

use crate::application::scanner::batch_scanner::ScanReport;
use crate::domain::ensemble::decision::EnsembleDecision;
use crate::domain::ensemble::performance::PerformanceHistory;
use crate::domain::forecast::signal::TradeSignal;
use crate::domain::risk::strategy_sizer::StrategyRecommendation;

pub struct SignalReporter;

impl SignalReporter {
    /// Prints the final decision and the per-model breakdown table.
    pub fn print_decision(symbol: &str, decision: &EnsembleDecision) {
        println!("\n{}", "=".repeat(80));
        println!(
            "📈 {} - {} over {} (regime: {})",
            symbol, decision.final_signal, decision.horizon, decision.regime
        );
        println!("{}", "=".repeat(80));

        println!(
            "{:<14} | {:<6} | {:>10} | {:>8} | {:>8} | {:>6} | {:>8}",
            "Model", "Signal", "Return%", "RawConf", "NormConf", "Weight", "Score"
        );
        println!("{}", "-".repeat(80));

        for row in &decision.per_model_breakdown {
            let predicted = row
                .result
                .predicted_return
                .map(|r| format!("{:>10.3}", r * 100.0))
                .unwrap_or_else(|| format!("{:>10}", "-"));
            println!(
                "{:<14} | {:<6} | {} | {:>8.4} | {:>8.4} | {:>6.2} | {:>8.4}",
                row.result.model_name,
                row.result.signal,
                predicted,
                row.result.confidence,
                row.normalized_confidence,
                row.weight,
                row.weighted_score
            );
            if row.result.signal == TradeSignal::Error
                && let Some(note) = &row.result.note
            {
                println!("    ↳ {}", note);
            }
        }

        println!("{}", "-".repeat(80));
        println!("  Tally:      {}", decision.vote_tally);
        println!("  Confidence: {:.1}%", decision.confidence * 100.0);
        if decision.regime_adjusted() {
            println!(
                "  Regime:     {} turned {} into {}",
                decision.regime, decision.signal_before_regime, decision.final_signal
            );
        }
        println!("  Rationale:  {}", decision.rationale);
        println!("{}\n", "=".repeat(80));
    }

    pub fn print_recommendation(rec: &StrategyRecommendation) {
        println!("🎯 STRATEGY:");
        println!("  Action:        {}", rec.action);
        println!("  Position size: {}%", rec.position_size_pct);
        println!("  Rebalance:     {}", rec.rebalance_frequency);
    }

    /// Prints one line per scanned symbol plus skipped symbols.
    pub fn print_scan(report: &ScanReport) {
        println!("\n{}", "=".repeat(80));
        println!(
            "✅ SCAN COMPLETE - {} rows (BUY {}, SELL {}, HOLD {}), {} skipped",
            report.rows.len(),
            report.count(TradeSignal::Buy),
            report.count(TradeSignal::Sell),
            report.count(TradeSignal::Hold),
            report.skipped.len()
        );
        println!("{}", "=".repeat(80));

        println!(
            "{:<10} | {:<6} | {:<8} | {:>10} | {:>7}",
            "Ticker", "Signal", "Regime", "Confidence", "Models"
        );
        println!("{}", "-".repeat(80));
        for row in &report.rows {
            println!(
                "{:<10} | {:<6} | {:<8} | {:>9.1}% | {:>3}/{:<3}",
                row.ticker,
                row.decision.final_signal,
                row.decision.regime,
                row.decision.confidence * 100.0,
                row.decision.usable_models(),
                row.decision.per_model_breakdown.len()
            );
        }

        if !report.skipped.is_empty() {
            println!("\n⚠️  Skipped:");
            for skipped in &report.skipped {
                println!("  {:<10} {}", skipped.symbol, skipped.reason);
            }
        }
        println!("{}\n", "=".repeat(80));
    }

    pub fn print_weights(history: &PerformanceHistory) {
        println!("\n🏆 MODEL WEIGHTS:");
        println!("{:<14} | {:>8} | {:>7} | {:>6}", "Model", "Accuracy", "Scored", "Weight");
        println!("{}", "-".repeat(44));
        for (model, weight) in &history.weights {
            let record = history.accuracies.get(model).copied().unwrap_or_default();
            let accuracy = record
                .accuracy()
                .map(|a| format!("{:>7.1}%", a * 100.0))
                .unwrap_or_else(|| format!("{:>8}", "-"));
            println!(
                "{:<14} | {} | {:>7} | {:>6.2}",
                model, accuracy, record.total, weight
            );
        }
    }
}
