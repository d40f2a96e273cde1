//! Sales domain module: checkout planning, receipts and the ledger model.
//!
//! This crate decides *what* a checkout does (which lines, which totals, which
//! failures). Applying that decision atomically against a store is the job of
//! the checkout sequencer in `tillpoint-infra`.

pub mod checkout;
pub mod ledger;

pub use checkout::{
    CheckoutError, CheckoutLine, CheckoutPlan, CheckoutReceipt, CheckoutRequest, PlannedLine,
    ReceiptLine,
};
pub use ledger::{NewSale, SaleLineItem, SaleRecord, SalesSummary};
