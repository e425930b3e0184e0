//! Prompts for the review evaluations.
//!
//! The hosted backend receives chat transcripts: a system instruction, a
//! few hand-authored example exchanges, and the section text as the last
//! user turn. The self-hosted backend receives one instruction block in the
//! `[INST] <<SYS>> ... <</SYS>> ... [/INST]` format.
//!
//! The article context is appended to every system instruction; a blank
//! context adds nothing.

use revisor_core::CohesionSections;

use crate::providers::ChatMessage;

/// Theme instruction for the hosted backend.
pub const THEME_SYSTEM_PROMPT: &str = r#"You are a scientific article revisor and you are specialist in every theme that is written in the text.

Judge with knowledge, suggesting to the author which topics should be emphasized better and what should be rewritten to bring better readability of the theme.

The categories of suggestions are:
- Improve References;
- Theme Violation;
- Missing Related Works if exists;
- Missing Informations;
- Confusing Explanation;
- Missing Limitations;
- Others.

Under Others you can generate other categories.

Also use clear language when you are suggesting, so it is clear in which parts of the text the author should make the changes.

List as many suggestions as you can. Besides, check if the document follows the DoCO, the Document Components Ontology that provides a structured vocabulary written in OWL 2 DL of document components, both structural (e.g. block, inline, paragraph, section, chapter) and rhetorical (e.g. introduction, discussion, acknowledgements, reference list, figure, appendix), enabling these components, and documents composed of them, to be described in RDF."#;

/// Example passage for the theme exchange.
const THEME_EXAMPLE_INPUT: &str = r#"A ideação e construção do CryptoComponent envolveu a elicitação de requisitos para seu funcionamento. Considerando a natureza restritiva dos dispositivos IoT, foi necessário identificar os tipos de algoritmos de criptografia passíveis de serem aplicados para mitigar o problema de segurança durante o tráfego de dados no sistema. Nesse contexto, dentre diferentes algoritmos de criptografia, tais como o Elephant [Beyne et al. 2020], Pyjamask [Goudarzi et al. 2020], SPARKLE [Beierle et al. 2020] e SPECK [Beaulieu et al. 2015]. Dentre os algoritmos de criptografia leve identificados na literatura técnica, foi escolhido o SPECK, tendo em vista ter sido criado para ser utilizado em dispositivos de baixo poder computacional, como por exemplo rede de sensores, incluindo dispositivos IoT [Beaulieu et al. 2015]. Sua escolha foi também influenciada pela simplicidade de utilização, na qual é necessário fornecer apenas uma chave única e uma mensagem de tamanho arbitrário para que o algoritmo produza uma mensagem encriptada. Neste sentido, não é necessário qualquer tipo de autenticação. Além disso, o SPECK é de simples implementação, apresenta segurança avaliada e, por ser uma criptografia de bloco, apresenta baixo consumo de recurso computacional [Beaulieu et al. 2015]. Adicionalmente, para fins de avaliação do componente, foi implementado o algoritmo de XOR, escolhido por ser uma das etapas para construção do algoritmo SPECK.
Em seguida, os requisitos funcionais e não funcionais do CryptoComponent foram especificados. Dentre estes, destacam-se a capacidade do componente de encriptar o dado passado como parâmetro imediatamente antes de ser enviado pela rede, garantindo assim que o dado trafegue de forma encriptada até seu recebimento na outra ponta e a capacidade do componente de decriptar o dado antes de ser consumido. Essa característica configura uma Criptografia E2E (End to End). A Tabela 1 mostra um extrato dos requisitos funcionais e não funcionais especificados para criação do CryptoComponent. A lista completa dos requisitos do CryptoComponent pode ser acessada em bit.ly/cryptocomponentlistofrequirements.
Após a definição dos requisitos, as escolhas para a implementação do projeto foram dadas visando garantir maior reutilização de código. Além disso, algumas decisões do projeto variaram entre a otimização do uso de recursos computacionais, tendo em vista a natureza do dispositivo e a facilidade da utilização por parte dos desenvolvedores, privilegiando a ampla utilização do componente. Sendo assim, por ser um componente para ser utilizado em dispositivos IoT, o CryptoComponent foi codificado na linguagem de programação C++. O diagrama de componentes apresentado na Figura 1 ilustra sua estrutura.
O componente pode ser utilizado em um dispositivo IoT por meio da instanciação de um objeto da classe CryptoComponent informando o algoritmo de interesse (XOR ou SPECK) e informando se a demanda é por Encriptar ou Decriptar a mensagem considerando uma Chave específica.
O CryptoComponent possibilita sua utilização pelos sistemas de software por meio de uma API (Application Programming Interface) que oferece acesso para as facilidades de encriptar e decriptar a informação independente da linguagem de programação. Neste caso, a comunicação entre os dispositivos IoT e o sistema de software deve ser realizada por meio de um broker, com protocolo MQTT, conforme apresentado na Figura 2.

A disponibilidade da API do CryptoComponent garante a possibilidade da encriptação/decriptação dos dados em todo o fluxo de recepção e envio da mensagem. O envio dos dados ao broker é feito por meio de rede pública utilizando o protocolo MQTT, logo, a utilização do componente nos dispositivos IoT garante a segurança do envio da mensagem. Da mesma forma, a segurança dos dados consumidos do broker é garantida porque as aplicações que estão consumindo esses dados, em nosso caso, são executadas em K3S, um kubernetes de baixo custo, que garante que cada uma delas utilize uma rede privada, fazendo com que seu tráfego de rede não seja visto externamente. Desta forma, pode-se dizer que os dados são transmitidos de forma segura e encriptada em cada um dos momentos da arquitetura apresentada na Figura 2. É importante ressaltar que a construção da API representa uma alternativa para garantir que o componente seja utilizado nos sistemas desenvolvidos pelo Laboratório de Engenharia de Software, não sendo necessário que outro usuário, por exemplo, tenha que utilizar o sistema K3S ou mesmo hospedar o serviço da API dentro de uma rede privada."#;

/// Expected critique for [`THEME_EXAMPLE_INPUT`].
const THEME_EXAMPLE_OUTPUT: &str = r#"The article is well written, clear and easy to understand.

But there are still a few things to improve, like:

Improve References:
- For instance, what is an MQTT protocol (with references)? Missing details about K3S (with references) for replication purposes. Unclear importance of API in relation to encryption/decryption already on IoT device. Clarify the role of Engineering Software Lab and systems needing the API. More explanation needed to avoid doubts.

Theme Violation:
- Authors lack cryptography experience and potentially implement insecure algorithms.
- Critical issues with the created component, such as allowing insecure algorithms.
- Usage of repeating-key XOR algorithm raises concerns about security.
- Lack of discussion on secure mode of operation for Speck cipher.

Missing Informations:
- Missing explanation of XOR and SPECK algorithms.

Confusing Explanation:
- Confusing explanation of the API's importance and the Engineering Software Lab's role."#;

/// Grammar instruction for the hosted backend.
pub const GRAMMAR_SYSTEM_PROMPT: &str = r#"You are a scientific article revisor and one of the steps is the grammar suggestion tool, giving which word or sentence should be changed.

The suggestions should be related to Correctness, like grammar and spelling, consistency in spelling and English fluency.

Also in Clarity, like conciseness, full-sentence rewrites and formatting.

Also in Engagement, like word choice and word and sentence variety.

Also in Delivery: these texts should have a formal writing.

You should also avoid suggestions that are already in the text. It's not necessary to suggest things that are already being made.

Try to give at least two suggestions."#;

/// (user, assistant) example exchanges for the grammar transcript.
const GRAMMAR_EXAMPLES: [(&str, &str); 3] = [
    (
        r#"IoT software systems have made great strides since the new industrial revolution known as Industry 4.0. Its usage has been growing over the years, and research reports indicate the occurrence of exponential growth related to the utilization of these devices, with a forecast of surpassing 30 billion devices by 2024.

As a result, organizations that frequently list the most common security risks enumerate that, in IoT software devices, secure data transfer and storage of information are among the top 10 most recurrent problems in these devices.

Thus, this project presents a cryptographic component designed to allow the data transferred, in low-power computing devices, to be transmitted securely, preventing data leaks. This work describes the details of the developed component, such as the hardware systems in which it was applied and the approach used for implementation."#,
        r#"2 additional writing issues. 1 Unclear sentences. 1 Passive voice misuse.
- You should remove "known as" in the sentence: "[...] revolution, known as Industry 4.0. [...]"
- You should remove "in which it was" in the sentence: "[...] systems in which it was applied and the approach [...]""#,
    ),
    (
        r#"The simulation itself is a snippet code that will run the simulation following the number of data that we want to simulate. In our case we ran triplicates scenarios that would, in each of them, send 80 messages to the broker and consume 80 messages from the broker, evaluating the time of them. We ran the experiment in three scenarios because we wanted to observe the standard deviation and the average."#,
        r#"1 suggestion. Conciseness.
- You should replace "run the simulation following" in the sentence: "[...] that will run the simulation following the number [...]" with "simulate". This will bring a non wordy sentence."#,
    ),
    (
        "We have to encrypted data",
        r#"1 possible fixes. Grammar.
- You should replace "encrypted" in the sentence: "We have to encrypted data" with "encrypt". That would correct the verb form."#,
    ),
];

/// Cohesion instruction for the hosted backend.
pub const COHESION_SYSTEM_PROMPT: &str = r#"You are a scientific article revisor and one of the steps is to evaluate the text cohesion. The user will give you the introduction, the abstract and the conclusion of the article. Your objective is to evaluate if they make sense together. For example, if the user gives the abstract and the introduction talks about another thing, there's something wrong and you should point that out to the user. If the introduction says something but the conclusion says the opposite, you should also point that out. If the introduction and conclusion are consistent but the abstract is not, you should also point that out. But if the three are consistent, you should say that the three are consistent."#;

/// Theme instruction for the self-hosted backend.
pub const INSTRUCT_THEME_PROMPT: &str = r#"As a scientific article reviewer with expertise in various themes, your role is to provide valuable feedback to the author for better emphasis and readability of the text. Your suggestions may fall into categories such as:

- Improve References
- Address Theme Violations
- Identify Missing Related Works (if any)
- Point Out Missing Information
- Clarify Confusing Explanations
- Address Missing Limitations
- Suggest Other Improvements

You can also create additional categories if needed. Ensure that your feedback is clear and specific, indicating the sections of the text that require changes."#;

/// Grammar instruction for the self-hosted backend.
pub const INSTRUCT_GRAMMAR_PROMPT: &str = r#"You are a scientific article reviewer tasked with grammar suggestions. Additionally, check if the document follows DoCO, the Document Components Ontology, which provides a structured vocabulary for document components, both structural (e.g., block, inline, paragraph, section) and rhetorical (e.g., introduction, discussion, acknowledgments, reference list). This ontology enables these components and documents composed of them to be described in RDF."#;

/// Summary instruction for the self-hosted cohesion path.
pub const INSTRUCT_SUMMARY_PROMPT: &str =
    "You are a scientific article reviewer tasked with summarizing a given text.";

/// Cohesion instruction for the self-hosted backend.
pub const INSTRUCT_COHESION_PROMPT: &str = r#"You are a scientific article reviewer tasked with evaluating the coherence between the sections of the provided article. Your role is to assess whether the "Abstract," "Introduction," and "Conclusion" align in terms of their content and messaging. If there are inconsistencies, please provide feedback to the user.

Your objective is to determine if these sections make sense together. For instance, if the abstract discusses one topic, but the introduction talks about something entirely different, please flag this as a potential issue. Similarly, if the introduction and conclusion have opposing statements, point that out. And if the three sections are consistent, acknowledge their cohesion."#;

/// Append the article context to an instruction.
fn with_context(instruction: &str, context: &str) -> String {
    let context = context.trim();
    if context.is_empty() {
        instruction.to_string()
    } else {
        format!(
            "{}\n\nThe user is also giving you a context about the article, so you can use it to evaluate the text: {}",
            instruction, context
        )
    }
}

fn final_user_turn(text: &str) -> ChatMessage {
    ChatMessage::user(format!("This is my prompt: {}", text))
}

fn labelled_sections(sections: &CohesionSections<'_>) -> String {
    format!(
        "Abstract: {}\nIntroduction: {}\nConclusion: {}",
        sections.abstract_text, sections.introduction, sections.conclusion
    )
}

/// Hosted theme transcript for one section.
pub fn hosted_theme_messages(context: &str, text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(with_context(THEME_SYSTEM_PROMPT, context)),
        ChatMessage::user(THEME_EXAMPLE_INPUT),
        ChatMessage::assistant(THEME_EXAMPLE_OUTPUT),
        final_user_turn(text),
    ]
}

/// Hosted grammar transcript for one section.
pub fn hosted_grammar_messages(context: &str, text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2 + GRAMMAR_EXAMPLES.len() * 2);
    messages.push(ChatMessage::system(with_context(GRAMMAR_SYSTEM_PROMPT, context)));
    for (input, output) in GRAMMAR_EXAMPLES {
        messages.push(ChatMessage::user(input));
        messages.push(ChatMessage::assistant(output));
    }
    messages.push(final_user_turn(text));
    messages
}

/// Hosted cohesion transcript over the three sections.
pub fn hosted_cohesion_messages(context: &str, sections: &CohesionSections<'_>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(with_context(COHESION_SYSTEM_PROMPT, context)),
        ChatMessage::user(format!("These are my prompts:\n{}", labelled_sections(sections))),
    ]
}

/// Wrap a system instruction and a body into one instruction block.
pub fn instruction_block(system: &str, body: &str) -> String {
    format!("[INST] <<SYS>>\n{}\n<</SYS>>\n\n{}\n\n[/INST]", system, body)
}

/// Self-hosted theme prompt for one section.
pub fn instruct_theme(context: &str, text: &str) -> String {
    instruction_block(&with_context(INSTRUCT_THEME_PROMPT, context), text)
}

/// Self-hosted grammar prompt for one section.
pub fn instruct_grammar(context: &str, text: &str) -> String {
    instruction_block(&with_context(INSTRUCT_GRAMMAR_PROMPT, context), text)
}

/// Self-hosted summary prompt for one section.
pub fn instruct_summary(text: &str) -> String {
    instruction_block(
        INSTRUCT_SUMMARY_PROMPT,
        &format!("Summarize the following text: {}", text),
    )
}

/// Self-hosted cohesion prompt over three section summaries.
pub fn instruct_cohesion(context: &str, summaries: &CohesionSections<'_>) -> String {
    instruction_block(
        &with_context(INSTRUCT_COHESION_PROMPT, context),
        &labelled_sections(summaries),
    )
}
