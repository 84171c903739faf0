//! Spanish HTML email templates
//!
//! Every interpolated value goes through [`escape_html`].

use crate::message::OutgoingEmail;

/// Escape text for HTML element and attribute content
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family:Arial,Helvetica,sans-serif;color:#1f2933;background:#f5f7fa;padding:24px">
<div style="max-width:560px;margin:0 auto;background:#ffffff;border-radius:8px;padding:24px">
<h2 style="color:#1d4ed8;margin-top:0">S.A.R.A.</h2>
{body}
<hr style="border:none;border-top:1px solid #e4e7eb;margin:24px 0">
<p style="font-size:12px;color:#7b8794">Sistema de Administración de Arriendos. Este es un mensaje automático, por favor no respondas a este correo.</p>
</div>
</body>
</html>"#,
        title = escape_html(title),
    )
}

fn button(link: &str, label: &str) -> String {
    format!(
        r#"<p><a href="{}" style="display:inline-block;background:#1d4ed8;color:#ffffff;padding:10px 18px;border-radius:6px;text-decoration:none">{}</a></p>
<p style="font-size:12px;color:#7b8794">Si el botón no funciona, copia este enlace en tu navegador:<br>{}</p>"#,
        escape_html(link),
        escape_html(label),
        escape_html(link),
    )
}

/// Password recovery link
#[must_use]
pub fn password_reset(to: &str, name: Option<&str>, link: &str, valid_minutes: u32) -> OutgoingEmail {
    let greeting = name.map_or_else(|| "Hola".to_string(), |n| format!("Hola {}", escape_html(n)));
    let body = format!(
        "<p>{greeting},</p>\
         <p>Recibimos una solicitud para restablecer la contraseña de tu cuenta.</p>\
         {}\
         <p>El enlace vence en {valid_minutes} minutos. Si no solicitaste este cambio, ignora este mensaje.</p>",
        button(link, "Restablecer contraseña"),
    );
    OutgoingEmail::new(to, "Restablece tu contraseña", layout("Restablece tu contraseña", &body))
}

/// Details shown in invitation emails
#[derive(Debug, Clone, Copy)]
pub struct InvitationDetails<'a> {
    /// Landlord display name
    pub landlord_name: &'a str,
    /// Property display name
    pub property_name: &'a str,
    /// Sign-up link
    pub link: &'a str,
    /// Expiry, already formatted
    pub expires_on: &'a str,
}

/// First invitation to a tenant who has no account yet
#[must_use]
pub fn contract_invitation(to: &str, details: InvitationDetails<'_>) -> OutgoingEmail {
    let body = format!(
        "<p>Hola,</p>\
         <p><strong>{}</strong> te invitó a revisar un contrato de arriendo para la propiedad <strong>{}</strong>.</p>\
         <p>Crea tu cuenta con este correo para ver el contrato, aprobarlo o dejar observaciones.</p>\
         {}\
         <p>La invitación vence el {}.</p>",
        escape_html(details.landlord_name),
        escape_html(details.property_name),
        button(details.link, "Crear cuenta y revisar contrato"),
        escape_html(details.expires_on),
    );
    let subject = format!("Invitación a contrato de arriendo: {}", details.property_name);
    OutgoingEmail::new(to, subject.clone(), layout(&subject, &body))
}

/// Reminder sent when the landlord resends an invitation
#[must_use]
pub fn invitation_reminder(to: &str, details: InvitationDetails<'_>, resent_count: u32) -> OutgoingEmail {
    let body = format!(
        "<p>Hola,</p>\
         <p>Te recordamos que <strong>{}</strong> te invitó a revisar el contrato de arriendo de <strong>{}</strong>.</p>\
         {}\
         <p>La invitación ahora vence el {}. (Recordatorio n.º {resent_count})</p>",
        escape_html(details.landlord_name),
        escape_html(details.property_name),
        button(details.link, "Revisar contrato"),
        escape_html(details.expires_on),
    );
    let subject = format!("Recordatorio: contrato de arriendo pendiente en {}", details.property_name);
    OutgoingEmail::new(to, subject.clone(), layout(&subject, &body))
}

/// Admin-triggered delivery check
#[must_use]
pub fn test_message(to: &str, sent_at: &str) -> OutgoingEmail {
    let body = format!(
        "<p>Este es un correo de prueba enviado desde S.A.R.A.</p>\
         <p>Si lo recibes, la configuración de correo funciona correctamente.</p>\
         <p style=\"font-size:12px;color:#7b8794\">Enviado: {}</p>",
        escape_html(sent_at),
    );
    OutgoingEmail::new(to, "Correo de prueba S.A.R.A.", layout("Correo de prueba", &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> InvitationDetails<'static> {
        InvitationDetails {
            landlord_name: "Pedro <script>",
            property_name: "Depto \"Centro\"",
            link: "https://sara.cl/registro?inv=01H&x=1",
            expires_on: "2024-07-01",
        }
    }

    #[test]
    fn escapes_everything_interpolated() {
        let mail = contract_invitation("ana@example.cl", details());
        assert!(!mail.html.contains("<script>"));
        assert!(mail.html.contains("Pedro &lt;script&gt;"));
        assert!(mail.html.contains("inv=01H&amp;x=1"));
        assert!(mail.html.contains("Depto &quot;Centro&quot;"));
        assert_eq!(mail.to, "ana@example.cl");
    }

    #[test]
    fn reminder_mentions_count() {
        let mail = invitation_reminder("ana@example.cl", details(), 2);
        assert!(mail.subject.starts_with("Recordatorio"));
        assert!(mail.html.contains("Recordatorio n.º 2"));
    }

    #[test]
    fn password_reset_greets_by_name() {
        let mail = password_reset("ana@example.cl", Some("Ana"), "https://sara.cl/r?c=1", 60);
        assert!(mail.html.contains("Hola Ana"));
        assert!(mail.html.contains("60 minutos"));
        let anon = password_reset("ana@example.cl", None, "https://sara.cl/r?c=1", 60);
        assert!(anon.html.contains("<p>Hola,</p>"));
    }

    #[test]
    fn test_message_has_timestamp() {
        let mail = test_message("admin@sara.cl", "2024-06-01 10:00 UTC");
        assert!(mail.html.contains("2024-06-01 10:00 UTC"));
    }
}
