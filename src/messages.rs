//! User-facing texts and keyboards
//!
//! Everything the bot says lives here so transitions and the executor only
//! decide *what* to say.

use crate::db::{Order, OrderId, OrderStats, OrderStatus};
use crate::state_machine::effect::{Button, Keyboard};
use crate::state_machine::event::{
    AdminCommand, BusinessKind, Choice, CommandError, DeleteFilter, PurposeKind,
};
use crate::state_machine::state::{AdminAction, Answers, Field};
use crate::validate::ValidationError;
use std::fmt::Write;

/// Telegram rejects messages longer than this many characters
pub const MAX_MESSAGE_CHARS: usize = 4096;

// ============================================================================
// Intake prompts
// ============================================================================

pub const WELCOME: &str = "سلام! به ربات ثبت سفارش طراحی وب‌سایت خوش آمدید.";

/// Question and optional keyboard for a field
pub fn prompt(field: Field, custom: bool) -> (String, Option<Keyboard>) {
    if custom {
        let text = match field {
            Field::Business => "نوع کسب‌وکار خود را بنویسید:",
            _ => "هدف خود از وب‌سایت را بنویسید:",
        };
        return (text.to_string(), None);
    }

    let text = match field {
        Field::Name => "لطفاً نام و نام خانوادگی خود را وارد کنید:",
        Field::Phone => "شماره موبایل خود را وارد کنید (مثلاً 09123456789):",
        Field::Email => "ایمیل خود را وارد کنید (اختیاری، برای رد شدن «.» بفرستید):",
        Field::Business => "نوع کسب‌وکار خود را انتخاب کنید:",
        Field::Purpose => "هدف از وب‌سایت خود را انتخاب کنید:",
        Field::Features => {
            "ویژگی‌های مدنظر خود را بنویسید (مثلاً گالری تصاویر، فرم تماس، وبلاگ):"
        }
        Field::Domain => "آیا دامنه و هاست دارید؟",
        Field::Extra => "توضیحات تکمیلی (در صورت نبود «-» بفرستید):",
        Field::Support => "آیا مایل به دریافت خدمات پشتیبانی هستید؟",
    };
    (text.to_string(), field_keyboard(field))
}

fn field_keyboard(field: Field) -> Option<Keyboard> {
    match field {
        Field::Business => Some(Keyboard::column(BusinessKind::ALL.into_iter().map(|kind| {
            choice_button(kind.label(), &Choice::Business(kind))
        }))),
        Field::Purpose => Some(Keyboard::column(PurposeKind::ALL.into_iter().map(|kind| {
            choice_button(kind.label(), &Choice::Purpose(kind))
        }))),
        Field::Domain => Some(yes_no_keyboard(Choice::Domain)),
        Field::Support => Some(yes_no_keyboard(Choice::Support)),
        _ => None,
    }
}

fn choice_button(label: &str, choice: &Choice) -> Button {
    Button::new(label, choice.token())
}

fn yes_no_keyboard(make: fn(bool) -> Choice) -> Keyboard {
    Keyboard::new().row([
        choice_button("بله", &make(true)),
        choice_button("خیر", &make(false)),
    ])
}

/// Corrective prompt after rejected input
pub fn invalid(field: Field, error: Option<ValidationError>) -> (String, Option<Keyboard>) {
    let reason = match (field, error) {
        (_, Some(ValidationError::NameTooShort)) => "نام باید حداقل ۲ حرف باشد.",
        (_, Some(ValidationError::InvalidPhone)) => {
            "شماره موبایل معتبر نیست. یک شماره ایرانی مثل 09123456789 وارد کنید."
        }
        (_, Some(ValidationError::InvalidEmail)) => {
            "ایمیل معتبر نیست. یک ایمیل درست وارد کنید یا «.» بفرستید."
        }
        (Field::Business | Field::Purpose | Field::Domain | Field::Support, None) => {
            "لطفاً یکی از گزینه‌ها را انتخاب کنید."
        }
        _ => "این مقدار نمی‌تواند خالی باشد.",
    };
    (reason.to_string(), field_keyboard(field))
}

// ============================================================================
// Review and confirmation
// ============================================================================

pub fn review(order_id: &OrderId, answers: &Answers) -> String {
    let mut text = String::from("لطفاً اطلاعات زیر را بررسی و تأیید کنید:\n\n");
    let _ = writeln!(text, "شناسه سفارش: {order_id}");
    for field in Field::ALL {
        let value = answers.display(field).unwrap_or_default();
        let _ = writeln!(text, "{}: {}", field.label(), or_dash(&value));
    }
    text
}

pub fn review_keyboard() -> Keyboard {
    Keyboard::new()
        .row([
            choice_button("✅ تأیید", &Choice::Confirm),
            choice_button("❌ لغو", &Choice::Discard),
        ])
        .row([choice_button("✏️ ویرایش", &Choice::Edit)])
}

pub const CONFIRM_HINT: &str = "برای تأیید «بله»، برای لغو «خیر» یا برای ویرایش «ویرایش» را بفرستید.";

pub const EDIT_PICK: &str = "کدام مورد را می‌خواهید ویرایش کنید؟";

pub fn edit_keyboard() -> Keyboard {
    let buttons: Vec<Button> = Field::ALL
        .into_iter()
        .map(|field| choice_button(field.label(), &Choice::EditField(field)))
        .collect();
    let mut keyboard = Keyboard::new();
    for pair in buttons.chunks(2) {
        keyboard = keyboard.row(pair.iter().cloned());
    }
    keyboard
}

pub fn submitted(order_id: &OrderId) -> String {
    format!(
        "✅ اطلاعات شما با شناسه {order_id} ثبت شد. کارشناسان ما در حال بررسی هستند و به زودی قیمت اعلام می‌شود.\nبرای پیگیری: /track {order_id}"
    )
}

pub const STORE_FAILURE: &str =
    "متأسفانه در ثبت سفارش خطایی رخ داد. لطفاً چند لحظه بعد دوباره تأیید کنید.";

pub const GENERIC_FAILURE: &str = "متأسفانه خطایی رخ داد. لطفاً بعداً دوباره تلاش کنید.";

pub const CANCELLED: &str = "❌ سفارش لغو شد. برای شروع مجدد /start را بزنید.";

pub const NOTHING_TO_CANCEL: &str = "عملیاتی در جریان نیست.";

pub const ADMIN_CANCELLED: &str = "عملیات مدیریت لغو شد.";

pub const START_FIRST: &str = "لطفاً ابتدا /start را بزنید.";

pub const USER_HELP: &str = "دستورات:\n/start - ثبت سفارش جدید\n/track <شناسه> - پیگیری سفارش\n/my_orders - سفارش‌های من\n/cancel - لغو عملیات جاری\n/help - راهنما";

/// Full order detail for the administrator
pub fn new_order(order: &Order, display_name: Option<&str>) -> String {
    let mut text = String::from("🆕 سفارش جدید:\n\n");
    text.push_str(&order_detail(order));
    let handle = order
        .username
        .as_deref()
        .map(|u| format!("@{u}"))
        .or_else(|| display_name.map(str::to_string));
    let _ = writeln!(text, "کاربر تلگرام: {}", handle.as_deref().unwrap_or("-"));
    text
}

pub fn order_detail(order: &Order) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "شناسه سفارش: {}", order.id);
    let _ = writeln!(text, "تاریخ ثبت: {}", order.created_display);
    let _ = writeln!(text, "{}: {}", Field::Name.label(), order.name);
    let _ = writeln!(text, "{}: {}", Field::Phone.label(), order.phone);
    let _ = writeln!(text, "{}: {}", Field::Email.label(), or_dash(&order.email));
    let _ = writeln!(text, "{}: {}", Field::Business.label(), order.business);
    let _ = writeln!(text, "{}: {}", Field::Purpose.label(), order.purpose);
    let _ = writeln!(text, "{}: {}", Field::Features.label(), order.features);
    let _ = writeln!(text, "{}: {}", Field::Domain.label(), yes_no(order.has_domain));
    let _ = writeln!(text, "{}: {}", Field::Extra.label(), or_dash(&order.extra));
    let _ = writeln!(text, "{}: {}", Field::Support.label(), yes_no(order.wants_support));
    let _ = writeln!(text, "وضعیت: {}", status_line(order));
    text
}

// ============================================================================
// Tracking
// ============================================================================

pub const TRACK_PROMPT: &str = "شناسه سفارش خود را وارد کنید (مثلاً ORD-AB12CD34):";

pub fn order_not_found(raw: &str) -> String {
    format!("سفارشی با شناسه {} یافت نشد.", raw.trim())
}

pub fn order_status(order: &Order) -> String {
    format!(
        "سفارش {}\nتاریخ ثبت: {}\nوضعیت: {}",
        order.id,
        order.created_display,
        status_line(order)
    )
}

pub fn my_orders(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "هنوز سفارشی ثبت نکرده‌اید. برای شروع /start را بزنید.".to_string();
    }
    let mut text = String::from("سفارش‌های شما:\n");
    for order in orders {
        let _ = writeln!(
            text,
            "\n{} | {} | {}",
            order.id,
            order.created_display,
            order.status.label()
        );
    }
    text
}

fn status_line(order: &Order) -> String {
    if order.status_text.is_empty() {
        order.status.label().to_string()
    } else {
        format!("{} ({})", order.status.label(), order.status_text)
    }
}

// ============================================================================
// Admin
// ============================================================================

pub const ADMIN_WELCOME: &str = "خوش آمدید ادمین! یک عملیات را انتخاب کنید:";

pub const ADMIN_HELP: &str = "دستورات مدیریت:\n/menu - منوی مدیریت\n/list_orders [وضعیت] - مشاهده سفارش‌ها\n/price <شناسه> [مبلغ] - اعلام قیمت\n/reject <شناسه> [دلیل] - رد سفارش\n/complete <شناسه> - تکمیل سفارش\n/stats - آمار\n/delete_old <روز|completed|rejected> - حذف سفارش‌ها\n/cancel - خروج از عملیات جاری";

fn admin_button(label: &str, command: &AdminCommand) -> Option<Button> {
    command.token().map(|token| Button::new(label, token))
}

pub fn admin_menu() -> Keyboard {
    Keyboard::new()
        .row(
            [
                admin_button("💰 قیمت‌گذاری", &AdminCommand::Begin(AdminAction::Price)),
                admin_button("⛔ رد سفارش", &AdminCommand::Begin(AdminAction::Reject)),
            ]
            .into_iter()
            .flatten(),
        )
        .row(
            [
                admin_button("✅ تکمیل", &AdminCommand::Begin(AdminAction::Complete)),
                admin_button("📋 فهرست", &AdminCommand::List { status: None }),
            ]
            .into_iter()
            .flatten(),
        )
        .row(
            [
                admin_button("📊 آمار", &AdminCommand::Stats),
                admin_button("🗑 حذف", &AdminCommand::DeleteMenu),
            ]
            .into_iter()
            .flatten(),
        )
}

pub const DELETE_PICK: &str = "کدام سفارش‌ها حذف شوند؟";

pub fn delete_menu() -> Keyboard {
    let options = [
        ("تکمیل‌شده‌ها", DeleteFilter::Status(OrderStatus::Completed)),
        ("ردشده‌ها", DeleteFilter::Status(OrderStatus::Rejected)),
        ("قدیمی‌تر از ۳۰ روز", DeleteFilter::OlderThanDays(30)),
        ("قدیمی‌تر از ۹۰ روز", DeleteFilter::OlderThanDays(90)),
    ];
    Keyboard::column(
        options
            .into_iter()
            .filter_map(|(label, filter)| admin_button(label, &AdminCommand::DeleteOld(filter))),
    )
}

fn action_title(action: AdminAction) -> &'static str {
    match action {
        AdminAction::Price => "قیمت‌گذاری",
        AdminAction::Reject => "رد",
        AdminAction::Complete => "تکمیل",
    }
}

/// Statuses an order must have to be offered for `action`
pub fn eligible_statuses(action: AdminAction) -> &'static [OrderStatus] {
    match action {
        AdminAction::Price => &[OrderStatus::Pending, OrderStatus::Priced],
        AdminAction::Reject => &[OrderStatus::Pending],
        AdminAction::Complete => &[OrderStatus::Priced],
    }
}

pub fn selection(action: AdminAction, orders: &[Order]) -> (String, Keyboard) {
    let text = format!("سفارش مورد نظر برای {} را انتخاب کنید:", action_title(action));
    let keyboard = Keyboard::column(orders.iter().filter_map(|order| {
        let label = format!("{} | {} | {}", order.id, order.name, order.status.label());
        admin_button(
            &label,
            &AdminCommand::Pick {
                action,
                order_id: order.id.clone(),
            },
        )
    }));
    (text, keyboard)
}

pub fn nothing_eligible(action: AdminAction) -> String {
    format!("سفارشی برای {} وجود ندارد.", action_title(action))
}

pub const PICK_FROM_LIST: &str = "لطفاً یکی از سفارش‌های فهرست را انتخاب کنید یا /cancel بزنید.";

pub fn price_prompt(order_id: &OrderId) -> String {
    format!("مبلغ سفارش {order_id} را به تومان وارد کنید (مثلاً 5,000,000):")
}

pub fn reason_prompt(order_id: &OrderId) -> String {
    format!("دلیل رد سفارش {order_id} را بنویسید:")
}

pub const INVALID_AMOUNT: &str = "مبلغ معتبر نیست. یک عدد صحیح مثل 5,000,000 وارد کنید.";

pub const EMPTY_REASON: &str = "دلیل رد نمی‌تواند خالی باشد.";

/// `5000000` → `5,000,000`
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Status text stored on a priced order
pub fn price_status_text(amount: u64) -> String {
    format!("{} تومان", format_amount(amount))
}

pub fn quote_for_owner(order: &Order, amount: u64) -> String {
    format!(
        "سلام {} عزیز، قیمت پروژه شما (سفارش {}) {} تومان است. برای هماهنگی بیشتر با شما تماس گرفته می‌شود.",
        order.name,
        order.id,
        format_amount(amount)
    )
}

pub fn rejection_for_owner(order: &Order, reason: &str) -> String {
    format!(
        "{} عزیز، درخواست شما (سفارش {}) بررسی شد. به دلیل {} امکان همکاری نیست. از صبوری و درک شما سپاسگزاریم.",
        order.name, order.id, reason
    )
}

pub fn completion_for_owner(order: &Order) -> String {
    format!(
        "{} عزیز، سفارش {} شما تکمیل شد. از همراهی شما سپاسگزاریم.",
        order.name, order.id
    )
}

pub fn admin_done(order: &Order) -> String {
    format!("✅ سفارش {} به وضعیت «{}» رفت.", order.id, status_line(order))
}

pub fn cannot_transition(order_id: &OrderId, from: OrderStatus, to: OrderStatus) -> String {
    format!(
        "سفارش {order_id} در وضعیت «{}» است و نمی‌تواند «{}» شود.",
        from.label(),
        to.label()
    )
}

pub fn order_list(orders: &[Order], status: Option<OrderStatus>) -> String {
    if orders.is_empty() {
        return match status {
            Some(status) => format!("سفارشی با وضعیت «{}» یافت نشد.", status.label()),
            None => "هیچ سفارشی ثبت نشده است.".to_string(),
        };
    }
    let mut text = format!("تعداد سفارش‌ها: {}\n", orders.len());
    for order in orders {
        let _ = write!(
            text,
            "\n{} | {} | {} | {} | {}\n",
            order.id,
            order.created_display,
            order.name,
            order.phone,
            status_line(order)
        );
    }
    text
}

pub fn stats(stats: &OrderStats) -> String {
    format!(
        "📊 آمار سفارش‌ها\nکل: {}\n{}: {}\n{}: {}\n{}: {}\n{}: {}",
        stats.total,
        OrderStatus::Pending.label(),
        stats.pending,
        OrderStatus::Priced.label(),
        stats.priced,
        OrderStatus::Completed.label(),
        stats.completed,
        OrderStatus::Rejected.label(),
        stats.rejected
    )
}

pub fn deleted(count: usize) -> String {
    format!("🗑 {count} سفارش حذف شد.")
}

pub fn bad_command(error: &CommandError) -> String {
    match error {
        CommandError::Unknown(command) => format!("دستور {command} شناخته نشد. /help را ببینید."),
        CommandError::Usage(usage) => format!("نحوه استفاده: {usage}"),
        CommandError::InvalidOrderId(raw) => format!("شناسه سفارش «{raw}» معتبر نیست."),
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "بله"
    } else {
        "خیر"
    }
}

/// Split a long text on line boundaries into messages under the transport limit
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            // A single oversized line is split on character boundaries
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
