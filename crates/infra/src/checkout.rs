//! Checkout sequencer: applies a [`CheckoutPlan`] atomically, then fires the
//! receipt email and payment request without waiting for them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};

use tillpoint_customers::Customer;
use tillpoint_sales::{CheckoutError, CheckoutPlan, CheckoutReceipt, CheckoutRequest, NewSale};

use crate::notify::{Mailer, PaymentGateway};
use crate::store::{CheckoutTx, DecrementError, SalesLedger, StoreError};

pub struct CheckoutService {
    ledger: Arc<dyn SalesLedger>,
    mailer: Arc<dyn Mailer>,
    payments: Arc<dyn PaymentGateway>,
}

impl CheckoutService {
    pub fn new(
        ledger: Arc<dyn SalesLedger>,
        mailer: Arc<dyn Mailer>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            mailer,
            payments,
        }
    }

    /// All-or-nothing: on any error the transaction is rolled back and no
    /// stock or ledger change is visible.
    #[instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id(), lines = request.lines().len()),
        err
    )]
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let mut tx = self.ledger.begin_checkout().await.map_err(persistence)?;

        match apply(&mut *tx, &request).await {
            Ok((customer, receipt)) => {
                tx.commit().await.map_err(persistence)?;
                self.dispatch(customer, receipt.clone());
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "checkout rollback failed");
                }
                Err(err)
            }
        }
    }

    fn dispatch(&self, customer: Customer, receipt: CheckoutReceipt) {
        let mailer = Arc::clone(&self.mailer);
        let payments = Arc::clone(&self.payments);
        tokio::spawn(async move {
            let (mailed, charged) = tokio::join!(
                mailer.send_receipt(&customer, &receipt),
                payments.request_payment(&customer.phone, receipt.total),
            );
            if let Err(err) = mailed {
                warn!(customer_id = %customer.id, error = %err, "receipt email failed");
            }
            if let Err(err) = charged {
                warn!(customer_id = %customer.id, error = %err, "payment request failed");
            }
        });
    }
}

async fn apply(
    tx: &mut dyn CheckoutTx,
    request: &CheckoutRequest,
) -> Result<(Customer, CheckoutReceipt), CheckoutError> {
    let customer = tx
        .find_customer(request.customer_id())
        .await
        .map_err(persistence)?
        .ok_or(CheckoutError::CustomerNotFound(request.customer_id()))?;

    let products: HashMap<_, _> = tx
        .lock_products(&request.product_ids())
        .await
        .map_err(persistence)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let plan = CheckoutPlan::build(request, &products)?;
    let sold_at = Utc::now();

    for line in plan.lines() {
        tx.decrement_quantity(line.product_id, line.quantity)
            .await
            .map_err(|err| match err {
                DecrementError::NotFound(id) => CheckoutError::ProductNotFound(id),
                DecrementError::WouldGoNegative { available } => CheckoutError::InsufficientStock {
                    product: line.name.clone(),
                    available,
                    requested: line.quantity,
                },
                DecrementError::Store(e) => persistence(e),
            })?;

        tx.append_sale(NewSale {
            product_id: line.product_id,
            customer_id: plan.customer_id(),
            quantity: line.quantity,
            total: line.line_total,
            sold_at,
        })
        .await
        .map_err(persistence)?;
    }

    Ok((customer, plan.receipt()))
}

fn persistence(err: StoreError) -> CheckoutError {
    CheckoutError::Persistence(err.to_string())
}
