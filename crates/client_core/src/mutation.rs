use shared::{
    amount::Amount,
    domain::{AccountAddress, JobId, PaymentId},
    protocol::MoveValue,
};

use crate::{
    dispatcher::MutationRequest,
    intent::{ContractModules, EntityFamily, ViewIntent},
};

/// State-changing contract calls the client can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    PostJob {
        job_id: JobId,
        description: String,
        payment_amount: Amount,
        deadline: u64,
    },
    AcceptJob(JobId),
    CompleteJob(JobId),
    PayFreelancer(JobId),
    RegisterFreelancer,
    MakePayment {
        payee: AccountAddress,
        amount: Amount,
        message: String,
    },
    RefundPayment(PaymentId),
}

impl Mutation {
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::PostJob { .. } => "post_job",
            Self::AcceptJob(_) => "accept_job",
            Self::CompleteJob(_) => "complete_job",
            Self::PayFreelancer(_) => "pay_freelancer",
            Self::RegisterFreelancer => "register_freelancer",
            Self::MakePayment { .. } => "make_payment",
            Self::RefundPayment(_) => "refund_payment",
        }
    }

    pub fn family(&self) -> EntityFamily {
        match self {
            Self::MakePayment { .. } | Self::RefundPayment(_) => EntityFamily::Payments,
            _ => EntityFamily::Jobs,
        }
    }

    pub fn arguments(&self) -> Vec<MoveValue> {
        match self {
            Self::PostJob {
                job_id,
                description,
                payment_amount,
                deadline,
            } => vec![
                MoveValue::U64(job_id.0),
                MoveValue::String(description.clone()),
                MoveValue::U64(payment_amount.raw()),
                MoveValue::U64(*deadline),
            ],
            Self::AcceptJob(job_id) | Self::CompleteJob(job_id) | Self::PayFreelancer(job_id) => {
                vec![MoveValue::U64(job_id.0)]
            }
            Self::RegisterFreelancer => Vec::new(),
            Self::MakePayment {
                payee,
                amount,
                message,
            } => vec![
                MoveValue::Address(payee.clone()),
                MoveValue::U64(amount.raw()),
                MoveValue::String(message.clone()),
            ],
            Self::RefundPayment(payment_id) => vec![MoveValue::U64(payment_id.0)],
        }
    }

    /// Views whose contents this call can change when issued by `signer`.
    pub fn affected_views(&self, signer: &AccountAddress) -> Vec<ViewIntent> {
        match self {
            Self::PostJob { .. } => vec![ViewIntent::AllJobs, ViewIntent::JobsByClient(signer.clone())],
            Self::AcceptJob(job_id) | Self::CompleteJob(job_id) => vec![
                ViewIntent::AllJobs,
                ViewIntent::JobsByFreelancer(signer.clone()),
                ViewIntent::JobById(*job_id),
            ],
            Self::PayFreelancer(job_id) => vec![
                ViewIntent::AllJobs,
                ViewIntent::JobsByClient(signer.clone()),
                ViewIntent::JobById(*job_id),
            ],
            Self::RegisterFreelancer => Vec::new(),
            Self::MakePayment { payee, .. } => vec![
                ViewIntent::AllPayments,
                ViewIntent::PaymentsByPayer(signer.clone()),
                ViewIntent::PaymentsByPayee(payee.clone()),
            ],
            Self::RefundPayment(payment_id) => vec![
                ViewIntent::AllPayments,
                ViewIntent::PaymentsByPayer(signer.clone()),
                ViewIntent::PaymentsByPayee(signer.clone()),
                ViewIntent::PaymentById(*payment_id),
            ],
        }
    }

    pub fn to_request(
        &self,
        modules: &ContractModules,
        signer: Option<AccountAddress>,
    ) -> MutationRequest {
        MutationRequest {
            operation: modules.function(self.family(), self.function_name()),
            arguments: self.arguments(),
            signer,
        }
    }
}
