// Risk settings and position sizing
pub mod strategy_sizer;
