//! Templates compiled into the binary.

use super::types::EmailTemplate;

/// Canonical template for new-document notifications.
pub const DOCUMENT_NOTIFICATION: &str = "emails/document_notification";

const DOCUMENT_NOTIFICATION_HTML: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="utf-8">
  <title>Novo documento disponível</title>
  <style>
    body { font-family: Arial, Helvetica, sans-serif; color: #333333; line-height: 1.5; }
    .container { max-width: 600px; margin: 0 auto; padding: 24px; }
    .details td { padding: 4px 12px 4px 0; }
    .button { display: inline-block; background-color: #1a5fb4; color: #ffffff;
              padding: 12px 24px; text-decoration: none; border-radius: 4px; }
    .footer { font-size: 12px; color: #777777; margin-top: 32px; }
  </style>
</head>
<body>
  <div class="container">
    <h2>Olá, {{client_name}}!</h2>
    <p>Um novo documento foi disponibilizado para você no portal da {{company_name}}.</p>
    <table class="details">
      <tr><td><strong>Tipo:</strong></td><td>{{document_kind_label}}</td></tr>
      <tr><td><strong>Título:</strong></td><td>{{document_title}}</td></tr>
      <tr><td><strong>Disponibilizado em:</strong></td><td>{{send_date_formatted}}</td></tr>
    </table>
    {{#description}}<p><strong>Descrição:</strong> {{description}}</p>{{/description}}
    <p>Por segurança, o arquivo não é enviado por e-mail. Acesse o portal para visualizar e baixar o documento:</p>
    <p><a class="button" href="{{portal_url}}">Acessar meus documentos</a></p>
    {{#document_url}}<p>Link direto para este documento: <a href="{{document_url}}">{{document_title}}</a></p>{{/document_url}}
    {{#login_url}}<p>Caso não esteja conectado, faça login em <a href="{{login_url}}">{{login_url}}</a>.</p>{{/login_url}}
    <p>Em caso de dúvidas, fale com a nossa equipe: <a href="mailto:{{support_email}}">{{support_email}}</a></p>
    <div class="footer">
      <p>Este é um e-mail automático, por favor não responda.</p>
      <p>&copy; {{current_year}} {{company_name}}</p>
    </div>
  </div>
</body>
</html>
"#;

/// Every template the service ships with.
pub fn builtin_templates() -> Vec<EmailTemplate> {
    vec![EmailTemplate::new(
        DOCUMENT_NOTIFICATION,
        DOCUMENT_NOTIFICATION_HTML,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_are_valid() {
        for template in builtin_templates() {
            template.validate().unwrap();
        }
    }
}
