//! Per-(expense, member) rows: the recorded share and the member's personal
//! approval.

use sea_orm::{ActiveValue, entity::prelude::*};

use crate::Expense;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub expense_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub share_minor: i64,
    pub approval_status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_delete = "Cascade"
    )]
    Expense,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expense.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) fn rows_for(expense: &Expense) -> Vec<ActiveModel> {
    expense
        .participants
        .iter()
        .map(|p| ActiveModel {
            expense_id: ActiveValue::Set(expense.id),
            user_id: ActiveValue::Set(p.member.id),
            share_minor: ActiveValue::Set(p.share.minor()),
            approval_status: ActiveValue::Set(p.approval.as_str().to_string()),
        })
        .collect()
}
