/*!
 * Quality pass over translated output.
 *
 * - **Polish**: deterministic clean-up applied to every merged value
 * - **Report**: non-fatal defect findings that drive targeted retries
 */

pub mod polish;
pub mod report;

pub use polish::{Polisher, is_long_form};
pub use report::{CategoryTotals, DefectCategory, QualityFinding, QualityReport, run_quality_checks};
